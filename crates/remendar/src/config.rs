//! Healer configuration.
//!
//! Loaded from YAML or JSON, then overridden by `REMENDAR_*` environment
//! variables, then validated:
//!
//! ```yaml
//! enabled: true
//! max_heal_attempts_per_key: 1
//! max_fallback_history: 5
//! reasoning_timeout_ms: 30000
//! event_log_path: target/healing.jsonl
//! llm:
//!   base_url: http://localhost:11434
//!   model: qwen2.5-coder
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::reference::ReferenceStore;
use crate::result::{RemendarError, RemendarResult};

/// Healing pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealerConfig {
    /// Run the AI healing path at all
    pub enabled: bool,
    /// AI healing attempts per key per run
    pub max_heal_attempts_per_key: u32,
    /// Old references kept per key after a heal
    pub max_fallback_history: usize,
    /// Characters of HTML included in the prompt
    pub html_excerpt_chars: usize,
    /// Characters of HTML kept in a snapshot
    pub snapshot_html_chars: usize,
    /// Similar elements kept in a snapshot
    pub surrounding_element_limit: usize,
    /// Upper bound on one reasoning-service call
    pub reasoning_timeout_ms: u64,
    /// Treat a unique hidden or disabled match as usable for waits
    pub accept_not_actionable_for_wait: bool,
    /// Give up acquiring the namespace lock after this long; must be positive
    pub store_lock_timeout_ms: u64,
    /// Append healing events to this JSON-lines file
    pub event_log_path: Option<PathBuf>,
    /// Hosted reasoning service settings
    pub llm: LlmConfig,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_heal_attempts_per_key: 1,
            max_fallback_history: 5,
            html_excerpt_chars: 5000,
            snapshot_html_chars: 20_000,
            surrounding_element_limit: 10,
            reasoning_timeout_ms: 30_000,
            accept_not_actionable_for_wait: true,
            store_lock_timeout_ms: 5000,
            event_log_path: None,
            llm: LlmConfig::default(),
        }
    }
}

impl HealerConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML
    pub fn from_yaml_str(yaml: &str) -> RemendarResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse JSON
    pub fn from_json_str(json: &str) -> RemendarResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a file, picking the format from its extension (`.json`, else YAML)
    pub fn from_file(path: impl AsRef<Path>) -> RemendarResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Apply `REMENDAR_*` overrides from the process environment
    pub fn apply_env(self) -> RemendarResult<Self> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `REMENDAR_*` overrides read through `lookup`
    pub fn apply_env_from<F>(mut self, lookup: F) -> RemendarResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REMENDAR_ENABLED") {
            self.enabled = parse_bool("REMENDAR_ENABLED", &v)?;
        }
        if let Some(v) = lookup("REMENDAR_MAX_ATTEMPTS") {
            self.max_heal_attempts_per_key = parse_num("REMENDAR_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("REMENDAR_FALLBACK_CAP") {
            self.max_fallback_history = parse_num("REMENDAR_FALLBACK_CAP", &v)?;
        }
        if let Some(v) = lookup("REMENDAR_REASONING_TIMEOUT_MS") {
            self.reasoning_timeout_ms = parse_num("REMENDAR_REASONING_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("REMENDAR_EVENT_LOG") {
            self.event_log_path = (!v.trim().is_empty()).then(|| PathBuf::from(v.trim()));
        }
        self.llm = self.llm.apply_env_from(&lookup);
        Ok(self)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> RemendarResult<()> {
        if self.max_fallback_history == 0 {
            return Err(RemendarError::config(
                "max_fallback_history must be at least 1",
            ));
        }
        if self.html_excerpt_chars == 0 {
            return Err(RemendarError::config("html_excerpt_chars must be positive"));
        }
        if self.html_excerpt_chars > self.snapshot_html_chars {
            return Err(RemendarError::config(format!(
                "html_excerpt_chars ({}) exceeds snapshot_html_chars ({})",
                self.html_excerpt_chars, self.snapshot_html_chars
            )));
        }
        if self.reasoning_timeout_ms == 0 {
            return Err(RemendarError::config("reasoning_timeout_ms must be positive"));
        }
        if self.store_lock_timeout_ms == 0 {
            return Err(RemendarError::config(
                "store_lock_timeout_ms must be positive",
            ));
        }
        Ok(())
    }

    /// Open a namespace file with this configuration's history cap and
    /// lock timeout
    pub fn open_store(&self, path: impl Into<PathBuf>) -> RemendarResult<ReferenceStore> {
        self.validate()?;
        Ok(ReferenceStore::open(path)?
            .with_max_fallbacks(self.max_fallback_history)
            .with_lock_timeout(self.store_lock_timeout()))
    }

    /// Reasoning call bound
    #[must_use]
    pub const fn reasoning_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoning_timeout_ms)
    }

    /// Store lock bound
    #[must_use]
    pub const fn store_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.store_lock_timeout_ms)
    }

    /// Disable the AI path
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Set attempts per key
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_heal_attempts_per_key = attempts;
        self
    }

    /// Set the fallback history cap
    #[must_use]
    pub fn with_fallback_cap(mut self, cap: usize) -> Self {
        self.max_fallback_history = cap;
        self
    }

    /// Set the reasoning timeout
    #[must_use]
    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set whether not-actionable matches are accepted for waits
    #[must_use]
    pub fn with_accept_not_actionable_for_wait(mut self, accept: bool) -> Self {
        self.accept_not_actionable_for_wait = accept;
        self
    }
}

/// Hosted reasoning service settings (OpenAI-compatible API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Server base URL, without `/v1/...`
    pub base_url: String,
    /// Model name sent with each request
    pub model: String,
    /// Environment variable holding the bearer token
    pub api_key_env: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Completion token limit
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder".to_string(),
            api_key_env: "REMENDAR_LLM_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

impl LlmConfig {
    /// Apply `REMENDAR_LLM_*` overrides read through `lookup`
    #[must_use]
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("REMENDAR_LLM_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = lookup("REMENDAR_LLM_MODEL") {
            self.model = model;
        }
        self
    }

    /// Bearer token, read from the variable named by `api_key_env`
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn parse_bool(name: &str, value: &str) -> RemendarResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RemendarError::config(format!(
            "{name}: expected a boolean, got '{other}'"
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> RemendarResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RemendarError::config(format!("{name}: expected a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = HealerConfig::default();
            assert!(config.enabled);
            assert_eq!(config.max_heal_attempts_per_key, 1);
            assert_eq!(config.max_fallback_history, 5);
            assert_eq!(config.reasoning_timeout(), Duration::from_secs(30));
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_yaml_partial_keeps_defaults() {
            let config = HealerConfig::from_yaml_str(
                "max_fallback_history: 3\nllm:\n  model: llama3\n",
            )
            .unwrap();
            assert_eq!(config.max_fallback_history, 3);
            assert_eq!(config.llm.model, "llama3");
            assert_eq!(config.llm.base_url, "http://localhost:11434");
            assert_eq!(config.html_excerpt_chars, 5000);
        }

        #[test]
        fn test_unknown_field_rejected() {
            let err = HealerConfig::from_yaml_str("max_fallbacks: 3\n").unwrap_err();
            assert!(matches!(err, RemendarError::Yaml(_)));
        }

        #[test]
        fn test_json_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("remendar.json");
            std::fs::write(&path, r#"{"enabled": false, "reasoning_timeout_ms": 100}"#).unwrap();
            let config = HealerConfig::from_file(&path).unwrap();
            assert!(!config.enabled);
            assert_eq!(config.reasoning_timeout_ms, 100);
        }

        #[test]
        fn test_open_store_applies_cap() {
            let dir = TempDir::new().unwrap();
            let config = HealerConfig::default().with_fallback_cap(2);
            let store = config.open_store(dir.path().join("login.json")).unwrap();
            assert_eq!(store.max_fallbacks(), 2);
            assert!(store.is_empty());
        }

        #[test]
        fn test_yaml_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("remendar.yaml");
            std::fs::write(&path, "event_log_path: out/healing.jsonl\n").unwrap();
            let config = HealerConfig::from_file(&path).unwrap();
            assert_eq!(
                config.event_log_path,
                Some(PathBuf::from("out/healing.jsonl"))
            );
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_env_overrides() {
            let config = HealerConfig::default()
                .apply_env_from(env(&[
                    ("REMENDAR_ENABLED", "off"),
                    ("REMENDAR_MAX_ATTEMPTS", "2"),
                    ("REMENDAR_FALLBACK_CAP", " 8 "),
                    ("REMENDAR_REASONING_TIMEOUT_MS", "1500"),
                    ("REMENDAR_EVENT_LOG", "healing.jsonl"),
                    ("REMENDAR_LLM_MODEL", "mistral"),
                ]))
                .unwrap();
            assert!(!config.enabled);
            assert_eq!(config.max_heal_attempts_per_key, 2);
            assert_eq!(config.max_fallback_history, 8);
            assert_eq!(config.reasoning_timeout_ms, 1500);
            assert_eq!(config.event_log_path, Some(PathBuf::from("healing.jsonl")));
            assert_eq!(config.llm.model, "mistral");
        }

        #[test]
        fn test_env_bad_number() {
            let err = HealerConfig::default()
                .apply_env_from(env(&[("REMENDAR_MAX_ATTEMPTS", "many")]))
                .unwrap_err();
            assert!(err.to_string().contains("REMENDAR_MAX_ATTEMPTS"));
        }

        #[test]
        fn test_env_bad_bool() {
            assert!(HealerConfig::default()
                .apply_env_from(env(&[("REMENDAR_ENABLED", "maybe")]))
                .is_err());
        }

        #[test]
        fn test_empty_event_log_clears_path() {
            let mut config = HealerConfig::default();
            config.event_log_path = Some(PathBuf::from("x"));
            let config = config
                .apply_env_from(env(&[("REMENDAR_EVENT_LOG", "")]))
                .unwrap();
            assert!(config.event_log_path.is_none());
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_zero_fallback_cap_rejected() {
            assert!(HealerConfig::default()
                .with_fallback_cap(0)
                .validate()
                .is_err());
        }

        #[test]
        fn test_excerpt_larger_than_snapshot_rejected() {
            let mut config = HealerConfig::default();
            config.html_excerpt_chars = 30_000;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("exceeds snapshot_html_chars"));
        }

        #[test]
        fn test_zero_timeout_rejected() {
            let config = HealerConfig::default().with_reasoning_timeout(Duration::ZERO);
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_zero_lock_timeout_rejected() {
            let mut config = HealerConfig::default();
            config.store_lock_timeout_ms = 0;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("store_lock_timeout_ms"));

            let dir = TempDir::new().unwrap();
            assert!(config.open_store(dir.path().join("login.json")).is_err());
        }

        #[test]
        fn test_zero_lock_timeout_in_yaml_rejected() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("healer.yaml");
            std::fs::write(&path, "store_lock_timeout_ms: 0\n").unwrap();
            let config = HealerConfig::from_file(&path).unwrap();
            assert_eq!(config.store_lock_timeout(), Duration::ZERO);
            assert!(config.validate().is_err());
        }
    }
}
