//! Result and error types for Remendar.
//!
//! Lower layers (driver, validator, engine) report structured outcomes and
//! never raise. Only the action wrapper turns a terminal outcome into a
//! [`RemendarError`] for the test author.

use thiserror::Error;

use crate::driver::ResolutionFailure;
use crate::engine::HealingResult;
use crate::reasoning::ServiceError;
use crate::reference::StoreError;

/// Result type for Remendar operations
pub type RemendarResult<T> = Result<T, RemendarError>;

/// Errors that can occur in Remendar
#[derive(Debug, Error)]
pub enum RemendarError {
    /// Element could not be resolved and healing did not recover it.
    ///
    /// Carries the original resolution failure plus the healing attempt
    /// (if one was made) as context.
    #[error("Element '{key}' could not be resolved: {failure}{}", healing_suffix(.healing.as_deref()))]
    ElementNotResolved {
        /// Element key
        key: String,
        /// The underlying resolution failure
        failure: ResolutionFailure,
        /// Healing attempt details, when the AI path ran
        healing: Option<Box<HealingResult>>,
    },

    /// No reference is known for the key and no seed was supplied
    #[error("No reference registered for element '{key}'")]
    UnknownElement {
        /// Element key
        key: String,
    },

    /// Reasoning service failure
    #[error("Reasoning service error: {0}")]
    Service(#[from] ServiceError),

    /// Reference store failure
    #[error("Reference store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl RemendarError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Healing details attached to a resolution failure, if any
    #[must_use]
    pub fn healing(&self) -> Option<&HealingResult> {
        match self {
            Self::ElementNotResolved { healing, .. } => healing.as_deref(),
            _ => None,
        }
    }
}

fn healing_suffix(healing: Option<&HealingResult>) -> String {
    healing.map_or_else(String::new, |h| {
        format!(
            " (healing {}, {} candidate(s) tried)",
            h.status,
            h.candidates_tried.len()
        )
    })
}
