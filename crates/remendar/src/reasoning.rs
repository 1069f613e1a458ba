//! Reasoning service capability.
//!
//! The healing engine sends a prompt and receives an ordered list of
//! candidate references. Anything able to do that (a hosted language
//! model, a local model, a scripted test double) implements
//! [`ReasoningService`].
//!
//! Responses from language models are free-form text. [`parse_candidates`]
//! accepts the shapes such services commonly produce and reports anything
//! else as [`ServiceError::Malformed`].

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use thiserror::Error;

/// Proposed replacement reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Reference expression
    pub selector: String,
    /// Self-reported confidence in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Candidate {
    /// Candidate without confidence
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            confidence: None,
        }
    }

    /// Set the confidence, clamped to `[0, 1]`
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(clamp_confidence(confidence));
        self
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Reasoning service failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Service could not be reached
    #[error("service unreachable: {message}")]
    Unreachable {
        /// Transport error description
        message: String,
    },

    /// Service answered with an error status
    #[error("service returned status {status}: {body}")]
    Api {
        /// HTTP-style status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Response could not be interpreted as candidates
    #[error("malformed response: {message}")]
    Malformed {
        /// What was wrong
        message: String,
    },

    /// Service did not answer in time
    #[error("service timed out after {elapsed_ms}ms")]
    Timeout {
        /// Time waited
        elapsed_ms: u64,
    },
}

impl ServiceError {
    /// Create a malformed-response error
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Create an unreachable error
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }
}

/// Proposes replacement references for a failed one
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send `prompt`, return candidates best first
    async fn propose(&self, prompt: &str) -> Result<Vec<Candidate>, ServiceError>;

    /// Short name for logs and events
    fn name(&self) -> &str;
}

// ============================================================================
// Response parsing
// ============================================================================

const LIST_KEYS: [&str; 5] = ["selectors", "candidates", "alternatives", "locators", "suggestions"];
const SELECTOR_KEYS: [&str; 3] = ["selector", "locator", "reference"];
const CONFIDENCE_KEYS: [&str; 2] = ["confidence", "score"];

/// Parse a free-form service response into candidates.
///
/// Accepted shapes, tried in order:
/// - a JSON array of strings or of objects with `selector` and optional
///   `confidence`
/// - a JSON object wrapping such an array under `selectors`,
///   `candidates`, `alternatives`, `locators` or `suggestions`
/// - either of the above inside a fenced code block or surrounded by prose
/// - a numbered or bulleted list where each line carries a backticked
///   reference and optionally `confidence: 0.8`
///
/// Confidence is clamped to `[0, 1]`. Blank and duplicate references are
/// dropped. An explicit empty list is `Ok(vec![])`.
///
/// # Errors
///
/// [`ServiceError::Malformed`] when no accepted shape matches.
pub fn parse_candidates(response: &str) -> Result<Vec<Candidate>, ServiceError> {
    let body = strip_code_fence(response);

    if let Some(value) = parse_json_fragment(body) {
        return candidates_from_json(&value);
    }

    let listed = candidates_from_lines(body);
    if listed.is_empty() {
        Err(ServiceError::malformed(
            "response contains neither a JSON candidate list nor a reference list",
        ))
    } else {
        Ok(dedupe(listed))
    }
}

fn strip_code_fence(response: &str) -> &str {
    let Some(start) = response.find("```") else {
        return response.trim();
    };
    let after = &response[start + 3..];
    // Skip the info string (```json)
    let content = after.find('\n').map_or(after, |nl| &after[nl + 1..]);
    content
        .find("```")
        .map_or(content, |end| &content[..end])
        .trim()
}

fn parse_json_fragment(body: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if value.is_array() || value.is_object() {
            return Some(value);
        }
    }
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (body.find(open), body.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&body[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn candidates_from_json(value: &Value) -> Result<Vec<Candidate>, ServiceError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            if let Some(items) = LIST_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array))
            {
                items
            } else if let Some(single) = candidate_from_value(value) {
                return Ok(vec![single]);
            } else {
                return Err(ServiceError::malformed(
                    "JSON object carries no candidate list",
                ));
            }
        }
        _ => return Err(ServiceError::malformed("JSON is not a list or object")),
    };

    if items.is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Vec<Candidate> = items.iter().filter_map(candidate_from_value).collect();
    if parsed.is_empty() {
        return Err(ServiceError::malformed(format!(
            "none of {} list entries is a usable reference",
            items.len()
        )));
    }
    Ok(dedupe(parsed))
}

fn candidate_from_value(value: &Value) -> Option<Candidate> {
    match value {
        Value::String(s) => Some(Candidate::new(s.trim())),
        Value::Object(map) => {
            let selector = SELECTOR_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))?;
            let confidence = CONFIDENCE_KEYS.iter().find_map(|k| match map.get(*k)? {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            });
            let candidate = Candidate::new(selector.trim());
            Some(match confidence {
                Some(c) => candidate.with_confidence(c),
                None => candidate,
            })
        }
        _ => None,
    }
}

fn candidates_from_lines(body: &str) -> Vec<Candidate> {
    static ITEM: OnceLock<Regex> = OnceLock::new();
    static CONFIDENCE: OnceLock<Regex> = OnceLock::new();
    let item = ITEM.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+.*?`([^`]+)`").expect("static pattern compiles")
    });
    let confidence = CONFIDENCE.get_or_init(|| {
        Regex::new(r"(?i)(?:confidence|score)\s*[:=]?\s*\(?\s*([01](?:\.\d+)?|\.\d+)")
            .expect("static pattern compiles")
    });

    body.lines()
        .filter_map(|line| {
            let selector = item.captures(line)?.get(1)?.as_str().trim().to_string();
            let candidate = Candidate::new(selector);
            Some(
                match confidence
                    .captures(line)
                    .and_then(|c| c[1].parse::<f64>().ok())
                {
                    Some(c) => candidate.with_confidence(c),
                    None => candidate,
                },
            )
        })
        .collect()
}

fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.selector.is_empty() && !out.iter().any(|c| c.selector == candidate.selector)
        {
            out.push(candidate);
        }
    }
    out
}

// ============================================================================
// Scripted service
// ============================================================================

/// Reasoning service that returns a fixed answer.
///
/// Records every prompt it receives. Used for offline runs and tests.
#[derive(Debug)]
pub struct ScriptedReasoner {
    response: Result<Vec<Candidate>, ServiceError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    /// Always propose `candidates`
    #[must_use]
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self::from_response(Ok(candidates))
    }

    /// Always propose these references, without confidence
    #[must_use]
    pub fn with_selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(selectors.into_iter().map(Candidate::new).collect())
    }

    /// Always fail with `error`
    #[must_use]
    pub fn failing(error: ServiceError) -> Self {
        Self::from_response(Err(error))
    }

    /// Parse a canned raw response once, then replay it
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        Self::from_response(parse_candidates(raw))
    }

    fn from_response(response: Result<Vec<Candidate>, ServiceError>) -> Self {
        Self {
            response,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Wait `delay` before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of proposals requested
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in order
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn propose(&self, prompt: &str) -> Result<Vec<Candidate>, ServiceError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
