//! Retry Controller
//!
//! Bounds how many AI healing attempts one element key may consume within a
//! single run, so a persistently broken element cannot loop through the
//! reasoning service. Counts are in-memory only and start at zero each run.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Default AI healing attempts per key per run
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// The key has used up its healing budget
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("healing attempts for '{key}' exhausted ({attempts}/{max})")]
pub struct AttemptsExceeded {
    /// Element key
    pub key: String,
    /// Attempts already made
    pub attempts: u32,
    /// Configured maximum
    pub max: u32,
}

/// Per-key healing attempt counter
#[derive(Debug)]
pub struct RetryController {
    max_attempts: u32,
    attempts: Mutex<HashMap<String, u32>>,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryController {
    /// Create a controller allowing `max_attempts` per key
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Configured maximum per key
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Claim one attempt for `key`.
    ///
    /// Check and increment happen under one lock, so two workers racing on
    /// the same key cannot both get the last attempt.
    ///
    /// # Errors
    ///
    /// [`AttemptsExceeded`] when the key has no attempts left.
    pub fn try_begin(&self, key: &str) -> Result<u32, AttemptsExceeded> {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let used = attempts.get(key).copied().unwrap_or(0);
        if used >= self.max_attempts {
            return Err(AttemptsExceeded {
                key: key.to_string(),
                attempts: used,
                max: self.max_attempts,
            });
        }
        let _ = attempts.insert(key.to_string(), used + 1);
        Ok(used + 1)
    }

    /// Attempts used by `key` so far
    #[must_use]
    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts
            .lock()
            .map(|a| a.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Forget all counts
    pub fn reset(&self) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.clear();
        }
    }
}
