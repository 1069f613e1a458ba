//! Healing events and where they go.
//!
//! Every healing invocation that gets past the primary reference produces
//! exactly one [`HealingEvent`], whatever the outcome. Events are handed to
//! an injected [`HealingEventSink`] rather than written to ambient global
//! state, so tests can capture them with a [`MemorySink`].
//!
//! ## Sinks
//!
//! | sink            | destination                           |
//! |-----------------|---------------------------------------|
//! | [`TracingSink`] | `tracing` events (default)            |
//! | [`MemorySink`]  | shared in-process buffer              |
//! | [`JsonlSink`]   | one JSON object per line in a file    |
//! | [`FanoutSink`]  | several of the above                  |

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::HealerConfig;
use crate::validator::Verdict;

/// Consecutive persistence failures that trigger a run-level warning
pub const PERSISTENCE_ESCALATION_THRESHOLD: u64 = 3;

/// How a healing invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventOutcome {
    /// A stored fallback resolved; no AI call
    Fallback,
    /// A proposed candidate was accepted
    Healed,
    /// Gave up before or during the reasoning call
    Exhausted,
    /// No proposed candidate was usable
    ValidationFailed,
}

/// One validated candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAttempt {
    /// Candidate reference
    pub selector: String,
    /// Validation verdict
    pub verdict: Verdict,
}

/// Structured record of one healing invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingEvent {
    /// Unique event id
    pub event_id: String,
    /// Reference that failed first (the primary)
    pub failed_reference: String,
    /// Element key
    pub element_key: String,
    /// Fallbacks attempted before the outcome
    pub attempted_fallbacks: Vec<String>,
    /// Whether the reasoning service was called
    pub ai_invoked: bool,
    /// Candidates validated, in order
    pub candidates_tried: Vec<CandidateAttempt>,
    /// Outcome
    pub outcome: EventOutcome,
    /// Reference that resolved the element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_reference: Option<String>,
    /// Service confidence for the winning candidate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Exhaustion reason or other detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Persistence failure message, when the heal was not saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    /// Result of the single retry of the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_succeeded: Option<bool>,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl HealingEvent {
    /// New event stamped with a fresh id and the current time
    #[must_use]
    pub fn new(
        element_key: impl Into<String>,
        failed_reference: impl Into<String>,
        outcome: EventOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            failed_reference: failed_reference.into(),
            element_key: element_key.into(),
            attempted_fallbacks: Vec::new(),
            ai_invoked: false,
            candidates_tried: Vec::new(),
            outcome,
            winning_reference: None,
            confidence: None,
            reason: None,
            degraded: None,
            retry_succeeded: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether the store could not persist the heal
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Receives healing events
pub trait HealingEventSink: Send + Sync {
    /// Record one event. Must not fail the caller.
    fn record_healing_event(&self, event: &HealingEvent);
}

/// Emits events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl HealingEventSink for TracingSink {
    fn record_healing_event(&self, event: &HealingEvent) {
        let tried = event.candidates_tried.len();
        match event.outcome {
            EventOutcome::Healed | EventOutcome::Fallback if !event.is_degraded() => {
                tracing::info!(
                    target: "remendar::healing",
                    key = %event.element_key,
                    failed = %event.failed_reference,
                    winner = event.winning_reference.as_deref().unwrap_or(""),
                    outcome = ?event.outcome,
                    ai_invoked = event.ai_invoked,
                    candidates_tried = tried,
                    "element healed"
                );
            }
            _ => {
                tracing::warn!(
                    target: "remendar::healing",
                    key = %event.element_key,
                    failed = %event.failed_reference,
                    outcome = ?event.outcome,
                    reason = event.reason.as_deref().unwrap_or(""),
                    degraded = event.degraded.as_deref().unwrap_or(""),
                    ai_invoked = event.ai_invoked,
                    candidates_tried = tried,
                    "healing did not complete cleanly"
                );
            }
        }
    }
}

/// Keeps events in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<HealingEvent>>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<HealingEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// No events recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events for one key
    #[must_use]
    pub fn for_key(&self, key: &str) -> Vec<HealingEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.element_key == key)
            .collect()
    }
}

impl HealingEventSink for MemorySink {
    fn record_healing_event(&self, event: &HealingEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Appends events as JSON lines
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlSink {
    /// Append to `path`, creating it when missing
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Output file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &HealingEvent) -> std::io::Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl HealingEventSink for JsonlSink {
    fn record_healing_event(&self, event: &HealingEvent) {
        if let Err(e) = self.append(event) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write healing event");
        }
    }
}

/// Forwards every event to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn HealingEventSink>>,
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanoutSink {
    /// Create an empty fanout
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn HealingEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl HealingEventSink for FanoutSink {
    fn record_healing_event(&self, event: &HealingEvent) {
        for sink in &self.sinks {
            sink.record_healing_event(event);
        }
    }
}

/// Sink described by `config`: tracing, plus a JSON-lines file when
/// `event_log_path` is set
#[must_use]
pub fn sink_for(config: &HealerConfig) -> Arc<dyn HealingEventSink> {
    match &config.event_log_path {
        Some(path) => Arc::new(
            FanoutSink::new()
                .with_sink(Arc::new(TracingSink))
                .with_sink(Arc::new(JsonlSink::new(path.clone()))),
        ),
        None => Arc::new(TracingSink),
    }
}

// ============================================================================
// Run statistics
// ============================================================================

/// Snapshot of [`HealingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingSummary {
    /// Resolved through a stored fallback
    pub fallback_hits: u64,
    /// Healed through a proposed candidate
    pub healed: u64,
    /// Exhausted invocations
    pub exhausted: u64,
    /// Invocations where no candidate was usable
    pub validation_failed: u64,
    /// Reasoning service calls
    pub ai_invocations: u64,
    /// Heals that could not be persisted
    pub persistence_failures: u64,
}

impl HealingSummary {
    /// Total recorded invocations
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.fallback_hits + self.healed + self.exhausted + self.validation_failed
    }
}

/// Run-level counters fed from healing events
#[derive(Debug, Default)]
pub struct HealingStats {
    fallback_hits: AtomicU64,
    healed: AtomicU64,
    exhausted: AtomicU64,
    validation_failed: AtomicU64,
    ai_invocations: AtomicU64,
    persistence_failures: AtomicU64,
    consecutive_persistence_failures: AtomicU64,
}

impl HealingStats {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one event.
    ///
    /// Escalates to a run-level warning once persistence has failed
    /// [`PERSISTENCE_ESCALATION_THRESHOLD`] times in a row.
    pub fn record(&self, event: &HealingEvent) {
        let counter = match event.outcome {
            EventOutcome::Fallback => &self.fallback_hits,
            EventOutcome::Healed => &self.healed,
            EventOutcome::Exhausted => &self.exhausted,
            EventOutcome::ValidationFailed => &self.validation_failed,
        };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        if event.ai_invoked {
            let _ = self.ai_invocations.fetch_add(1, Ordering::Relaxed);
        }

        if event.is_degraded() {
            let _ = self.persistence_failures.fetch_add(1, Ordering::Relaxed);
            let streak = self
                .consecutive_persistence_failures
                .fetch_add(1, Ordering::Relaxed)
                + 1;
            if streak == PERSISTENCE_ESCALATION_THRESHOLD {
                tracing::warn!(
                    target: "remendar::healing",
                    consecutive = streak,
                    "reference store keeps failing to persist heals; healed references will be lost after this run"
                );
            }
        } else if event.outcome == EventOutcome::Healed {
            self.consecutive_persistence_failures
                .store(0, Ordering::Relaxed);
        }
    }

    /// Current counts
    #[must_use]
    pub fn summary(&self) -> HealingSummary {
        HealingSummary {
            fallback_hits: self.fallback_hits.load(Ordering::Relaxed),
            healed: self.healed.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            validation_failed: self.validation_failed.load(Ordering::Relaxed),
            ai_invocations: self.ai_invocations.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }

    /// Consecutive persistence failures so far
    #[must_use]
    pub fn persistence_failure_streak(&self) -> u64 {
        self.consecutive_persistence_failures.load(Ordering::Relaxed)
    }
}
