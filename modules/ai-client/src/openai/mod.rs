mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AiError, AiResult};
use crate::traits::{EmbedAgent, TextGenerator};

use client::{OpenAiClient, OPENAI_API_URL};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const DEFAULT_MAX_TOKENS: u32 = 4096;

// =============================================================================
// OpenAi Agent
// =============================================================================

/// OpenAI (or any OpenAI-compatible endpoint) chat + embeddings.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    embedding_model: String,
    base_url: Option<String>,
    system_prompt: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_env(model: impl Into<String>) -> AiResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AiError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> AiResult<OpenAiClient> {
        OpenAiClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(OPENAI_API_URL),
            self.timeout,
        )
    }

    /// Chat completion with an explicit system and user message.
    pub async fn chat_completion(&self, system: &str, user: &str) -> AiResult<String> {
        let request = types::ChatRequest::new(&self.model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user))
            .token_budget(DEFAULT_MAX_TOKENS, self.temperature);

        self.client()?
            .chat(&request)
            .await?
            .first_text()
            .ok_or_else(|| AiError::EmptyResponse(format!("openai:{}", self.model)))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

#[async_trait]
impl TextGenerator for OpenAi {
    fn backend(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> AiResult<String> {
        self.chat_completion(&self.system_prompt, prompt).await
    }
}

#[async_trait]
impl EmbedAgent for OpenAi {
    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed_batch(&self, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client()?
            .embed_batch(&self.embedding_model, texts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini");
        assert_eq!(ai.model(), "gpt-4o-mini");
        assert_eq!(ai.embedding_model(), "text-embedding-3-small");
        assert!(ai.base_url.is_none());
    }

    #[test]
    fn test_openai_builders() {
        let ai = OpenAi::new("sk-test", "gpt-4o")
            .with_embedding_model("text-embedding-3-large")
            .with_base_url("https://custom.api.com/v1")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(ai.embedding_model(), "text-embedding-3-large");
        assert_eq!(ai.base_url.as_deref(), Some("https://custom.api.com/v1"));
        assert_eq!(ai.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        let ai = OpenAi::new("sk-test", "gpt-4o").with_base_url("http://127.0.0.1:1");
        let vectors = ai.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
