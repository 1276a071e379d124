mod client;
pub(crate) mod types;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{AiError, AiResult};
use crate::traits::{EmbedAgent, TextGenerator};

use client::{GeminiClient, GEMINI_API_URL};

/// Alternates tried, in order, when the configured model fails or answers empty.
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-flash-lite",
    "gemini-1.5-flash-002",
    "gemini-1.5-pro-002",
];

// =============================================================================
// Gemini Agent
// =============================================================================

/// Google Gemini via the Generative Language REST API (API-key mode).
///
/// Once an alternate model answers, it becomes the active model for later
/// calls on this instance and its clones.
#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    active_model: Arc<RwLock<String>>,
    fallback_models: Vec<String>,
    embedding_model: String,
    base_url: Option<String>,
    temperature: f32,
    timeout: Duration,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            active_model: Arc::new(RwLock::new(model.into())),
            fallback_models: DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            embedding_model: "text-embedding-004".to_string(),
            base_url: None,
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_env(model: impl Into<String>) -> AiResult<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| AiError::Config("GOOGLE_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
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

    /// Model that produced (or will first attempt) the next answer.
    pub fn model(&self) -> String {
        match self.active_model.read() {
            Ok(model) => model.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn client(&self) -> AiResult<GeminiClient> {
        GeminiClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(GEMINI_API_URL),
            self.timeout,
        )
    }

    /// Active model first, then each alternate not equal to it.
    fn candidate_models(&self) -> Vec<String> {
        let active = self.model();
        let mut models = vec![active.clone()];
        models.extend(
            self.fallback_models
                .iter()
                .filter(|m| **m != active)
                .cloned(),
        );
        models
    }

    fn promote(&self, model: &str) {
        if let Ok(mut active) = self.active_model.write() {
            if *active != model {
                info!(from = %active, to = model, "Switching active Gemini model");
                *active = model.to_string();
            }
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

#[async_trait]
impl TextGenerator for Gemini {
    fn backend(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> AiResult<String> {
        let client = self.client()?;
        let request = types::GenerateRequest {
            contents: vec![types::Content::user(prompt)],
            generation_config: types::GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: 8192,
            },
        };

        let mut last_error = None;
        for model in self.candidate_models() {
            match client.generate(&model, &request).await {
                Ok(Some(text)) => {
                    self.promote(&model);
                    return Ok(text);
                }
                Ok(None) => {
                    warn!(model = %model, "Gemini returned no text");
                    last_error = Some(AiError::EmptyResponse(format!("gemini:{model}")));
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini request failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::Config("no Gemini models configured".into())))
    }
}

#[async_trait]
impl EmbedAgent for Gemini {
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
