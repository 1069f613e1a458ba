//! Reasoning service backed by a chat-completion model.

use async_trait::async_trait;

use super::client::{ChatMessage, LlmClient};
use crate::config::LlmConfig;
use crate::reasoning::{parse_candidates, Candidate, ReasoningService, ServiceError};

const SYSTEM_PROMPT: &str = "You repair UI element references for browser test automation. \
Answer only with a JSON array of objects with \"selector\", \"confidence\" and \"reasoning\" fields.";

/// [`ReasoningService`] that asks an OpenAI-compatible model
#[derive(Debug, Clone)]
pub struct LlmReasoner {
    client: LlmClient,
    temperature: f64,
    max_tokens: u32,
}

impl LlmReasoner {
    /// Build from settings; the API key is read from `api_key_env`
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let client =
            LlmClient::new(&config.base_url, &config.model).with_api_key(config.api_key());
        Self {
            client,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Wrap an existing client
    #[must_use]
    pub fn new(client: LlmClient) -> Self {
        let defaults = LlmConfig::default();
        Self {
            client,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Underlying client
    #[must_use]
    pub fn client(&self) -> &LlmClient {
        &self.client
    }
}

#[async_trait]
impl ReasoningService for LlmReasoner {
    async fn propose(&self, prompt: &str) -> Result<Vec<Candidate>, ServiceError> {
        let response = self
            .client
            .chat_completion(
                vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
                Some(self.temperature),
                Some(self.max_tokens),
            )
            .await?;
        let content = response
            .first_content()
            .ok_or_else(|| ServiceError::malformed("completion has no choices"))?;
        parse_candidates(content)
    }

    fn name(&self) -> &str {
        self.client.model()
    }
}
