use std::sync::Arc;
use std::time::Duration;

use ai_client::{Gemini, OpenAi, TextGenerator};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::file_config::{FileConfig, Provider};

/// Ordered chain of text generators. The first non-empty answer wins.
#[derive(Clone, Default)]
pub struct LlmService {
    providers: Vec<Arc<dyn TextGenerator>>,
}

impl LlmService {
    pub fn new(providers: Vec<Arc<dyn TextGenerator>>) -> Self {
        Self { providers }
    }

    /// A service with no backends; every completion is `None`.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Build the chain from `[models].providers`, skipping any provider whose
    /// API key is not set.
    pub fn from_config(config: &AppConfig, file_config: &FileConfig) -> Self {
        let models = &file_config.models;
        let timeout = Duration::from_secs(models.request_timeout_secs);
        let mut providers: Vec<Arc<dyn TextGenerator>> = Vec::new();

        for provider in &models.providers {
            match provider {
                Provider::Gemini => {
                    let Some(key) = &config.google_api_key else {
                        info!("GOOGLE_API_KEY not set, skipping Gemini");
                        continue;
                    };
                    let model = config.model_override.as_deref().unwrap_or(&models.llm);
                    let mut gemini = Gemini::new(key.clone(), model)
                        .with_temperature(models.temperature)
                        .with_timeout(timeout);
                    if let Some(alts) = &config.alt_models {
                        gemini = gemini.with_fallback_models(alts.clone());
                    }
                    providers.push(Arc::new(gemini));
                }
                Provider::OpenAi => {
                    let Some(key) = &config.openai_api_key else {
                        info!("OPENAI_API_KEY not set, skipping OpenAI");
                        continue;
                    };
                    let mut openai = OpenAi::new(key.clone(), models.openai_llm.clone())
                        .with_temperature(models.temperature)
                        .with_timeout(timeout);
                    if let Some(url) = &config.openai_base_url {
                        openai = openai.with_base_url(url.clone());
                    }
                    providers.push(Arc::new(openai));
                }
            }
        }

        let service = Self::new(providers);
        if service.is_available() {
            info!(backends = ?service.backends(), "LLM backends configured");
        } else {
            warn!("No LLM backend configured, steps will use rule-based fallbacks");
        }
        service
    }

    pub fn is_available(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn backends(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.backend()).collect()
    }

    /// Ask each backend in turn. Errors and blank answers move on to the next
    /// backend; `None` when nobody answered.
    pub async fn complete(&self, prompt: &str) -> Option<String> {
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) if !text.trim().is_empty() => return Some(text),
                Ok(_) => warn!(backend = provider.backend(), "Empty LLM response"),
                Err(e) => warn!(backend = provider.backend(), error = %e, "LLM call failed"),
            }
        }
        None
    }
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("backends", &self.backends())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::{AiError, AiResult};
    use async_trait::async_trait;

    struct Canned(&'static str, AiResult<String>);

    #[async_trait]
    impl TextGenerator for Canned {
        fn backend(&self) -> &str {
            self.0
        }
        async fn generate(&self, _prompt: &str) -> AiResult<String> {
            match &self.1 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(AiError::Network(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn first_non_empty_answer_wins() {
        let service = LlmService::new(vec![
            Arc::new(Canned("down", Err(AiError::Network("refused".into())))),
            Arc::new(Canned("blank", Ok("   ".into()))),
            Arc::new(Canned("good", Ok("hello".into()))),
            Arc::new(Canned("never", Ok("unused".into()))),
        ]);
        assert_eq!(service.complete("hi").await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn no_backends_means_none() {
        let service = LlmService::unavailable();
        assert!(!service.is_available());
        assert_eq!(service.complete("hi").await, None);
    }

    #[test]
    fn from_config_skips_providers_without_keys() {
        let config = AppConfig::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        });
        let service = LlmService::from_config(&config, &FileConfig::default());
        assert_eq!(service.backends(), vec!["openai"]);
    }

    #[test]
    fn from_config_respects_provider_order() {
        let config = AppConfig::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "GOOGLE_API_KEY" => Some("g-test".to_string()),
            _ => None,
        });
        let mut file_config = FileConfig::default();
        file_config.models.providers = vec![Provider::OpenAi, Provider::Gemini];
        let service = LlmService::from_config(&config, &file_config);
        assert_eq!(service.backends(), vec!["openai", "gemini"]);
    }
}
