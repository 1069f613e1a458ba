//! Candidate Validator
//!
//! Checks one proposed reference against the live page and classifies it.
//! Validation is read-only: the driver is asked to count matches and, for a
//! unique match, whether the element can be acted on. Nothing is clicked or
//! typed here.
//!
//! ```text
//! matches == 0      → NotFound
//! matches  > 1      → Ambiguous
//! matches == 1      → Usable | NotActionable
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::driver::{ActionKind, HealingDriver};

/// Outcome of validating one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// Exactly one match, actionable
    Usable,
    /// No match
    NotFound,
    /// More than one match
    Ambiguous,
    /// Exactly one match, but hidden or disabled
    NotActionable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Usable => "usable",
            Self::NotFound => "not-found",
            Self::Ambiguous => "ambiguous",
            Self::NotActionable => "not-actionable",
        })
    }
}

/// Validates candidate references against the live page
#[derive(Debug, Clone, Copy)]
pub struct CandidateValidator {
    accept_not_actionable_for_wait: bool,
}

impl Default for CandidateValidator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CandidateValidator {
    /// Create a validator
    #[must_use]
    pub const fn new(accept_not_actionable_for_wait: bool) -> Self {
        Self {
            accept_not_actionable_for_wait,
        }
    }

    /// Classify `candidate` on the current page.
    ///
    /// A blank candidate is `NotFound` without touching the driver.
    pub async fn validate(
        &self,
        candidate: &str,
        driver: &dyn HealingDriver,
        action: ActionKind,
    ) -> Verdict {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Verdict::NotFound;
        }
        let verdict = match driver.resolve_count(candidate).await {
            0 => Verdict::NotFound,
            1 => {
                if driver.is_actionable(candidate).await {
                    Verdict::Usable
                } else {
                    Verdict::NotActionable
                }
            }
            _ => Verdict::Ambiguous,
        };
        tracing::trace!(candidate, %action, %verdict, "candidate validated");
        verdict
    }

    /// Whether `verdict` lets the candidate be used for `action`
    #[must_use]
    pub const fn accepts(&self, verdict: Verdict, action: ActionKind) -> bool {
        match verdict {
            Verdict::Usable => true,
            Verdict::NotActionable => {
                self.accept_not_actionable_for_wait && matches!(action, ActionKind::Wait)
            }
            Verdict::NotFound | Verdict::Ambiguous => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use crate::snapshot::ElementContext;

    fn page() -> MockDriver {
        MockDriver::new()
            .with_element(MockElement::new(ElementContext::new("button")).matching("#ok"))
            .with_element(
                MockElement::new(ElementContext::new("button"))
                    .matching("#spinner")
                    .hidden(),
            )
            .with_element(MockElement::new(ElementContext::new("li")).matching("li"))
            .with_element(MockElement::new(ElementContext::new("li")).matching("li"))
    }

    mod verdict_tests {
        use super::*;

        #[tokio::test]
        async fn test_unique_actionable_is_usable() {
            let v = CandidateValidator::default()
                .validate("#ok", &page(), ActionKind::Click)
                .await;
            assert_eq!(v, Verdict::Usable);
        }

        #[tokio::test]
        async fn test_no_match_is_not_found() {
            let v = CandidateValidator::default()
                .validate("#missing", &page(), ActionKind::Click)
                .await;
            assert_eq!(v, Verdict::NotFound);
        }

        #[tokio::test]
        async fn test_many_matches_is_ambiguous() {
            let driver = page();
            let v = CandidateValidator::default()
                .validate("li", &driver, ActionKind::Click)
                .await;
            assert_eq!(v, Verdict::Ambiguous);
            assert!(!driver.was_called("is_actionable"));
        }

        #[tokio::test]
        async fn test_hidden_is_not_actionable() {
            let v = CandidateValidator::default()
                .validate("#spinner", &page(), ActionKind::Click)
                .await;
            assert_eq!(v, Verdict::NotActionable);
        }

        #[tokio::test]
        async fn test_blank_candidate_skips_driver() {
            let driver = page();
            let v = CandidateValidator::default()
                .validate("   ", &driver, ActionKind::Click)
                .await;
            assert_eq!(v, Verdict::NotFound);
            assert!(driver.history().is_empty());
        }

        #[tokio::test]
        async fn test_validation_is_idempotent() {
            let driver = page();
            let validator = CandidateValidator::default();
            for candidate in ["#ok", "#missing", "li", "#spinner"] {
                let first = validator.validate(candidate, &driver, ActionKind::Click).await;
                let second = validator.validate(candidate, &driver, ActionKind::Click).await;
                assert_eq!(first, second, "{candidate}");
            }
        }

        #[test]
        fn test_verdict_serialization() {
            let json = serde_json::to_string(&Verdict::NotActionable).unwrap();
            assert_eq!(json, "\"not-actionable\"");
            assert_eq!(Verdict::NotFound.to_string(), "not-found");
        }
    }

    mod acceptance_tests {
        use super::*;

        #[test]
        fn test_usable_always_accepted() {
            let v = CandidateValidator::new(false);
            assert!(v.accepts(Verdict::Usable, ActionKind::Click));
            assert!(v.accepts(Verdict::Usable, ActionKind::Wait));
        }

        #[test]
        fn test_not_actionable_only_for_wait() {
            let v = CandidateValidator::default();
            assert!(v.accepts(Verdict::NotActionable, ActionKind::Wait));
            assert!(!v.accepts(Verdict::NotActionable, ActionKind::Click));
            assert!(!v.accepts(Verdict::NotActionable, ActionKind::Fill));
        }

        #[test]
        fn test_not_actionable_rejected_when_disabled() {
            let v = CandidateValidator::new(false);
            assert!(!v.accepts(Verdict::NotActionable, ActionKind::Wait));
        }

        #[test]
        fn test_not_found_and_ambiguous_rejected() {
            let v = CandidateValidator::default();
            assert!(!v.accepts(Verdict::NotFound, ActionKind::Wait));
            assert!(!v.accepts(Verdict::Ambiguous, ActionKind::Click));
        }
    }
}
