//! Healing Engine
//!
//! Runs one action against an element's known references and, when all of
//! them fail, asks the reasoning service for replacements.
//!
//! ```text
//!  TryPrimary ──ok──────────────────────────────────────────► Done
//!      │ fail
//!      ▼
//!  TryFallbacks ──ok (event: fallback)──────────────────────► Done
//!      │ all fail
//!      ▼
//!  disabled / attempts used / cancelled ────────────────────► Exhausted
//!      │
//!      ▼
//!  AiHealing ── service error / timeout ────────────────────► Exhausted
//!      │ candidates
//!      ▼
//!  Validating ── none usable ───────────────────────────────► ValidationFailed
//!      │ first usable
//!      ▼
//!  Persisting ── store error marks the result degraded
//!      │
//!      ▼
//!  Retrying (exactly once, no further healing) ─────────────► Done
//! ```
//!
//! Reference attempts and candidate validations are strictly sequential.
//! The engine never raises: every path ends in an [`ActionOutcome`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::analyzer::FailureAnalyzer;
use crate::config::HealerConfig;
use crate::driver::{Action, HealingDriver, ResolutionFailure};
use crate::events::{
    sink_for, CandidateAttempt, EventOutcome, HealingEvent, HealingEventSink, HealingStats,
    HealingSummary, TracingSink,
};
use crate::reasoning::{Candidate, ReasoningService, ServiceError};
use crate::reference::{ReferenceEntry, ReferenceStore};
use crate::result::{RemendarError, RemendarResult};
use crate::retry::RetryController;
use crate::snapshot::SnapshotCapturer;
use crate::validator::CandidateValidator;

/// Why a healing invocation gave up without validating candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExhaustedReason {
    /// The key already used its healing budget this run
    AttemptsExceeded,
    /// The AI path is switched off
    Disabled,
    /// The reasoning service failed
    ServiceFailure {
        /// Service error text
        message: String,
    },
    /// The reasoning call ran out of time or the run was cancelled
    Timeout {
        /// Cancelled by the run rather than the timeout
        cancelled: bool,
    },
}

impl fmt::Display for ExhaustedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttemptsExceeded => f.write_str("attempts-exceeded"),
            Self::Disabled => f.write_str("disabled"),
            Self::ServiceFailure { message } => write!(f, "service-failure: {message}"),
            Self::Timeout { cancelled: false } => f.write_str("timeout"),
            Self::Timeout { cancelled: true } => f.write_str("timeout: cancelled"),
        }
    }
}

/// Terminal status of one healing invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum HealingStatus {
    /// A candidate was accepted
    Healed,
    /// Gave up before validating candidates
    Exhausted {
        /// Why
        reason: ExhaustedReason,
    },
    /// No candidate was usable
    ValidationFailed,
}

impl HealingStatus {
    /// Whether a replacement reference was found
    #[must_use]
    pub const fn is_healed(&self) -> bool {
        matches!(self, Self::Healed)
    }
}

impl fmt::Display for HealingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healed => f.write_str("healed"),
            Self::Exhausted { reason } => write!(f, "exhausted ({reason})"),
            Self::ValidationFailed => f.write_str("validation-failed"),
        }
    }
}

/// Details of one AI healing invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingResult {
    /// Terminal status
    #[serde(flatten)]
    pub status: HealingStatus,
    /// Accepted candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_reference: Option<String>,
    /// Service confidence for the accepted candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Candidates validated, in order
    pub candidates_tried: Vec<CandidateAttempt>,
    /// Set when the heal worked but could not be persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl HealingResult {
    /// Result with no candidates tried
    #[must_use]
    pub fn new(status: HealingStatus) -> Self {
        Self {
            status,
            winning_reference: None,
            confidence: None,
            candidates_tried: Vec::new(),
            degraded: None,
        }
    }

    /// Whether persistence failed
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Which reference completed the action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "kebab-case")]
pub enum ResolvedVia {
    /// The stored primary
    Primary,
    /// A stored fallback
    Fallback {
        /// Position in the fallback list
        index: usize,
    },
    /// A candidate from the reasoning service
    Healed,
}

/// Result of [`HealingEngine::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The action ran
    Completed {
        /// Reference the action ran against
        reference: String,
        /// How it was found
        via: ResolvedVia,
        /// AI healing details, when that path ran
        healing: Option<HealingResult>,
    },
    /// The action could not be performed
    Failed {
        /// Failure surfaced to the caller
        failure: ResolutionFailure,
        /// AI healing details, when that path ran
        healing: Option<HealingResult>,
    },
}

impl ActionOutcome {
    /// Whether the action ran
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Healing details, if any
    #[must_use]
    pub const fn healing(&self) -> Option<&HealingResult> {
        match self {
            Self::Completed { healing, .. } | Self::Failed { healing, .. } => healing.as_ref(),
        }
    }
}

/// Healing state, for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealingState {
    /// Attempting the primary reference
    TryPrimary,
    /// Attempting stored fallbacks
    TryFallbacks,
    /// Waiting on the reasoning service
    AiHealing,
    /// Validating candidates
    Validating,
    /// Writing the winner to the store
    Persisting,
    /// Re-running the action on the winner
    Retrying,
    /// Finished
    Done,
}

/// Healing pipeline for one run.
///
/// Shared by all actions of a worker; per-key attempt accounting lives
/// here, so one engine per run is the intended lifetime.
pub struct HealingEngine {
    store: Arc<ReferenceStore>,
    reasoner: Arc<dyn ReasoningService>,
    sink: Arc<dyn HealingEventSink>,
    config: HealerConfig,
    retry: RetryController,
    analyzer: FailureAnalyzer,
    validator: CandidateValidator,
    capturer: SnapshotCapturer,
    stats: HealingStats,
    cancellation: CancellationToken,
}

impl fmt::Debug for HealingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealingEngine")
            .field("store", &self.store)
            .field("reasoner", &self.reasoner.name())
            .field("config", &self.config)
            .field("retry", &self.retry)
            .finish()
    }
}

impl HealingEngine {
    /// Create an engine with default configuration and a [`TracingSink`]
    #[must_use]
    pub fn new(store: Arc<ReferenceStore>, reasoner: Arc<dyn ReasoningService>) -> Self {
        let config = HealerConfig::default();
        Self {
            store,
            reasoner,
            sink: Arc::new(TracingSink),
            retry: RetryController::new(config.max_heal_attempts_per_key),
            analyzer: FailureAnalyzer::new(config.html_excerpt_chars),
            validator: CandidateValidator::new(config.accept_not_actionable_for_wait),
            capturer: SnapshotCapturer::new(
                config.snapshot_html_chars,
                config.surrounding_element_limit,
            ),
            config,
            stats: HealingStats::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Create an engine from a validated configuration, with the event sink
    /// it describes.
    ///
    /// The store must carry the configuration's fallback cap and lock
    /// timeout; open it with [`HealerConfig::open_store`].
    pub fn from_config(
        store: Arc<ReferenceStore>,
        reasoner: Arc<dyn ReasoningService>,
        config: HealerConfig,
    ) -> RemendarResult<Self> {
        config.validate()?;
        if store.max_fallbacks() != config.max_fallback_history {
            return Err(RemendarError::config(format!(
                "store keeps {} fallbacks but max_fallback_history is {}",
                store.max_fallbacks(),
                config.max_fallback_history
            )));
        }
        if store.lock_timeout() != config.store_lock_timeout() {
            return Err(RemendarError::config(format!(
                "store lock timeout is {}ms but store_lock_timeout_ms is {}",
                store.lock_timeout().as_millis(),
                config.store_lock_timeout_ms
            )));
        }
        let sink = sink_for(&config);
        Ok(Self::new(store, reasoner).with_config(config).with_sink(sink))
    }

    /// Replace the configuration.
    ///
    /// The store keeps its own fallback cap and lock timeout.
    #[must_use]
    pub fn with_config(mut self, config: HealerConfig) -> Self {
        self.retry = RetryController::new(config.max_heal_attempts_per_key);
        self.analyzer = FailureAnalyzer::new(config.html_excerpt_chars);
        self.validator = CandidateValidator::new(config.accept_not_actionable_for_wait);
        self.capturer =
            SnapshotCapturer::new(config.snapshot_html_chars, config.surrounding_element_limit);
        self.config = config;
        self
    }

    /// Send events to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn HealingEventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Abort pending reasoning calls when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Reference store
    #[must_use]
    pub fn store(&self) -> &Arc<ReferenceStore> {
        &self.store
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &HealerConfig {
        &self.config
    }

    /// Retry controller
    #[must_use]
    pub const fn retry_controller(&self) -> &RetryController {
        &self.retry
    }

    /// Run counters
    #[must_use]
    pub fn stats(&self) -> HealingSummary {
        self.stats.summary()
    }

    /// Cancellation token
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Perform `action` on the element described by `entry`, healing if needed
    pub async fn execute(
        &self,
        driver: &dyn HealingDriver,
        entry: &ReferenceEntry,
        action: &Action,
    ) -> ActionOutcome {
        let key = entry.key.as_str();
        trace_state(key, HealingState::TryPrimary);
        let original = match driver.attempt(&entry.primary, action).await {
            Ok(()) => {
                return ActionOutcome::Completed {
                    reference: entry.primary.clone(),
                    via: ResolvedVia::Primary,
                    healing: None,
                }
            }
            Err(failure) => failure,
        };
        tracing::debug!(key, reference = %entry.primary, %original, "primary reference failed");

        trace_state(key, HealingState::TryFallbacks);
        let mut event = HealingEvent::new(key, &entry.primary, EventOutcome::Exhausted);
        for (index, fallback) in entry.fallbacks.iter().enumerate() {
            event.attempted_fallbacks.push(fallback.clone());
            if driver.attempt(fallback, action).await.is_ok() {
                event.outcome = EventOutcome::Fallback;
                event.winning_reference = Some(fallback.clone());
                self.emit(&event);
                return ActionOutcome::Completed {
                    reference: fallback.clone(),
                    via: ResolvedVia::Fallback { index },
                    healing: None,
                };
            }
        }

        let result = self.heal(driver, entry, action, &mut event).await;
        self.finish(driver, action, original, result, event).await
    }

    /// AI path: everything between "all references failed" and "winner chosen"
    async fn heal(
        &self,
        driver: &dyn HealingDriver,
        entry: &ReferenceEntry,
        action: &Action,
        event: &mut HealingEvent,
    ) -> HealingResult {
        let key = entry.key.as_str();

        if !self.config.enabled {
            return exhausted(ExhaustedReason::Disabled);
        }
        if let Err(e) = self.retry.try_begin(key) {
            tracing::debug!(key, error = %e, "skipping AI healing");
            return exhausted(ExhaustedReason::AttemptsExceeded);
        }
        if self.cancellation.is_cancelled() {
            return exhausted(ExhaustedReason::Timeout { cancelled: true });
        }

        trace_state(key, HealingState::AiHealing);
        let snapshot = self.capturer.capture(driver, Some(&entry.primary)).await;
        let analysis = self.analyzer.analyze(&entry.primary, &snapshot, Some(entry));
        let prompt = self.analyzer.build_prompt(&analysis);

        event.ai_invoked = true;
        let candidates = match self.propose(&prompt).await {
            Ok(candidates) => candidates,
            Err(reason) => {
                tracing::warn!(
                    key,
                    service = self.reasoner.name(),
                    %reason,
                    "reasoning service did not return candidates"
                );
                return exhausted(reason);
            }
        };

        trace_state(key, HealingState::Validating);
        let mut result = HealingResult::new(HealingStatus::ValidationFailed);
        for candidate in candidates {
            let verdict = self
                .validator
                .validate(&candidate.selector, driver, action.kind())
                .await;
            result.candidates_tried.push(CandidateAttempt {
                selector: candidate.selector.clone(),
                verdict,
            });
            if self.validator.accepts(verdict, action.kind()) {
                result.status = HealingStatus::Healed;
                result.winning_reference = Some(candidate.selector);
                result.confidence = candidate.confidence;
                break;
            }
        }

        if let Some(winner) = result.winning_reference.as_deref() {
            trace_state(key, HealingState::Persisting);
            if let Err(e) = self.store.record_heal(key, winner).await {
                tracing::error!(key, winner, error = %e, "healed reference was not persisted");
                result.degraded = Some(e.to_string());
            }
        }
        result
    }

    /// Bound the reasoning call by the configured timeout and the run token
    async fn propose(&self, prompt: &str) -> Result<Vec<Candidate>, ExhaustedReason> {
        let timeout = self.config.reasoning_timeout();
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(ExhaustedReason::Timeout { cancelled: true }),
            answer = tokio::time::timeout(timeout, self.reasoner.propose(prompt)) => match answer {
                Ok(Ok(candidates)) => Ok(candidates),
                Ok(Err(ServiceError::Timeout { .. })) | Err(_) => {
                    Err(ExhaustedReason::Timeout { cancelled: false })
                }
                Ok(Err(e)) => Err(ExhaustedReason::ServiceFailure {
                    message: e.to_string(),
                }),
            },
        }
    }

    /// Retry on the winner, emit the event, build the outcome
    async fn finish(
        &self,
        driver: &dyn HealingDriver,
        action: &Action,
        original: ResolutionFailure,
        result: HealingResult,
        mut event: HealingEvent,
    ) -> ActionOutcome {
        let key = event.element_key.clone();
        event.candidates_tried = result.candidates_tried.clone();
        event.winning_reference = result.winning_reference.clone();
        event.confidence = result.confidence;
        event.degraded = result.degraded.clone();
        event.outcome = match &result.status {
            HealingStatus::Healed => EventOutcome::Healed,
            HealingStatus::Exhausted { reason } => {
                event.reason = Some(reason.to_string());
                EventOutcome::Exhausted
            }
            HealingStatus::ValidationFailed => EventOutcome::ValidationFailed,
        };

        let Some(winner) = result.winning_reference.clone() else {
            self.emit(&event);
            trace_state(&key, HealingState::Done);
            return ActionOutcome::Failed {
                failure: original,
                healing: Some(result),
            };
        };

        trace_state(&key, HealingState::Retrying);
        let retried = driver.attempt(&winner, action).await;
        event.retry_succeeded = Some(retried.is_ok());
        self.emit(&event);
        trace_state(&key, HealingState::Done);

        match retried {
            Ok(()) => ActionOutcome::Completed {
                reference: winner,
                via: ResolvedVia::Healed,
                healing: Some(result),
            },
            Err(failure) => {
                tracing::warn!(key, winner, %failure, "action failed on healed reference");
                ActionOutcome::Failed {
                    failure,
                    healing: Some(result),
                }
            }
        }
    }

    fn emit(&self, event: &HealingEvent) {
        self.stats.record(event);
        self.sink.record_healing_event(event);
    }
}

fn exhausted(reason: ExhaustedReason) -> HealingResult {
    HealingResult::new(HealingStatus::Exhausted { reason })
}

fn trace_state(key: &str, state: HealingState) {
    tracing::trace!(key, ?state, "healing state");
}
