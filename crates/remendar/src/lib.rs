//! Remendar: Self-Healing Locator Resolution for Browser E2E Tests
//!
//! Remendar (Spanish: "to mend") sits between UI actions in a test and the
//! browser driver. When an element reference stops resolving it tries the
//! element's stored fallbacks, then asks a reasoning service for
//! replacements, validates them on the live page, persists the winner and
//! retries the action once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        REMENDAR Architecture                          │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  HealingPage ──► ReferenceStore ──► HealingDriver.attempt            │
//! │      │                                    │ fail                     │
//! │      │                                    ▼                          │
//! │      │          HealingEngine ──► SnapshotCapturer + FailureAnalyzer │
//! │      │               │                    │ prompt                   │
//! │      │               │                    ▼                          │
//! │      │               │            ReasoningService.propose           │
//! │      │               │                    │ candidates               │
//! │      │               ▼                    ▼                          │
//! │      │        RetryController     CandidateValidator                 │
//! │      │                                    │ winner                   │
//! │      ◄──── ActionReport ◄── retry ◄── ReferenceStore.record_heal     │
//! │                                                                      │
//! │  every invocation past the primary ──► HealingEventSink              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Healing Event Sinks and Run Statistics
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod events;

/// Action Wrapper: the entry point page-level code calls
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod action;

/// Failure Analyzer: heuristic reference analysis and prompt rendering
#[allow(clippy::must_use_candidate, clippy::doc_markdown)]
pub mod analyzer;

/// Healer configuration (YAML/JSON + environment)
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
pub mod config;

/// Driver seam and the mock driver used in tests
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod driver;

/// Healing Engine state machine
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod engine;

/// Subscriber setup for binaries and test harnesses
pub mod logging;

/// Reasoning service capability, response parsing and a scripted service
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod reasoning;

/// Reference Store: persisted primary and fallback references per key
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
pub mod reference;

mod result;

/// Retry Controller: per-key healing budget
pub mod retry;

/// DOM snapshots captured at failure time
#[allow(clippy::must_use_candidate, clippy::missing_const_for_fn)]
pub mod snapshot;

/// Candidate Validator
#[allow(clippy::must_use_candidate)]
pub mod validator;

/// Hosted reasoning service over an OpenAI-compatible API.
///
/// Feature-gated behind `llm`.
#[cfg(feature = "llm")]
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod llm;

pub use action::{ActionReport, HealingPage};
pub use analyzer::{ElementType, FailureAnalyzer, LocatorAnalysis};
pub use config::{HealerConfig, LlmConfig};
pub use driver::{Action, ActionKind, HealingDriver, MockDriver, MockElement, ResolutionFailure};
pub use engine::{
    ActionOutcome, ExhaustedReason, HealingEngine, HealingResult, HealingState, HealingStatus,
    ResolvedVia,
};
pub use events::{
    CandidateAttempt, EventOutcome, FanoutSink, HealingEvent, HealingEventSink, HealingStats,
    HealingSummary, JsonlSink, MemorySink, TracingSink,
};
pub use logging::LogFormat;
pub use reasoning::{parse_candidates, Candidate, ReasoningService, ScriptedReasoner, ServiceError};
pub use reference::{ReferenceEntry, ReferenceStore, StoreError};
pub use result::{RemendarError, RemendarResult};
pub use retry::{AttemptsExceeded, RetryController};
pub use snapshot::{DomSnapshot, ElementContext, PageCapture, SnapshotCapturer};
pub use validator::{CandidateValidator, Verdict};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::action::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::engine::*;
    pub use super::events::*;
    #[cfg(feature = "llm")]
    pub use super::llm::LlmReasoner;
    pub use super::reasoning::*;
    pub use super::reference::*;
    pub use super::result::*;
    pub use super::snapshot::*;
    pub use super::validator::*;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod export_tests {
        use super::*;

        #[test]
        fn test_defaults_line_up() {
            let config = HealerConfig::default();
            let store = ReferenceStore::in_memory();
            assert_eq!(store.max_fallbacks(), config.max_fallback_history);
            assert_eq!(
                RetryController::default().max_attempts(),
                config.max_heal_attempts_per_key
            );
        }

        #[test]
        fn test_engine_from_config_rejects_invalid() {
            let store = std::sync::Arc::new(ReferenceStore::in_memory());
            let reasoner = std::sync::Arc::new(ScriptedReasoner::with_selectors(["#a"]));
            let err = HealingEngine::from_config(
                store,
                reasoner,
                HealerConfig::default().with_fallback_cap(0),
            )
            .unwrap_err();
            assert!(matches!(err, RemendarError::Config { .. }));
        }
    }
}
