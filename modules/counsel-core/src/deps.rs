use crate::config::AppConfig;
use crate::embedding::EmbeddingProvider;
use crate::file_config::{load_or_default, EmbeddingBackend, FileConfig};
use crate::llm::LlmService;
use crate::memo::{Clock, MemoCache, SystemClock};
use crate::prompt_registry::PromptRegistry;
use crate::vector_store::{CacheDir, SimilarityStore, TextFields};
use ai_client::{EmbedAgent, Gemini, OpenAi};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Central dependency container handed to the pipeline and its steps.
#[derive(Clone)]
pub struct CounselDeps {
    pub llm: LlmService,
    pub embedder: EmbeddingProvider,
    pub prompts: Arc<PromptRegistry>,
    pub config: AppConfig,
    pub file_config: Arc<FileConfig>,
    /// Directory that relative data and prompt paths resolve against.
    pub config_dir: PathBuf,
    pub clock: Arc<dyn Clock>,
}

impl CounselDeps {
    pub fn new(
        llm: LlmService,
        embedder: EmbeddingProvider,
        prompts: Arc<PromptRegistry>,
        config: AppConfig,
        file_config: Arc<FileConfig>,
        config_dir: PathBuf,
    ) -> Self {
        Self {
            llm,
            embedder,
            prompts,
            config,
            file_config,
            config_dir,
            clock: Arc::new(SystemClock),
        }
    }

    /// Load the TOML file named by `config.config_path` (defaults when it is
    /// missing), compile the prompts and wire up the remote backends.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let file_config = load_or_default(&config.config_path)?;
        let config_dir = config
            .config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let prompts = PromptRegistry::load(&file_config, &config_dir)?;
        let llm = LlmService::from_config(&config, &file_config);
        let embedder = build_embedder(&config, &file_config);

        Ok(Self::new(
            llm,
            embedder,
            Arc::new(prompts),
            config,
            Arc::new(file_config),
            config_dir,
        ))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve a data or prompt path from the config against `config_dir`.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        FileConfig::resolve_path(&self.config_dir, path)
    }

    /// Embedding cache directory from `[vector_store]`.
    pub fn cache_dir(&self) -> CacheDir {
        CacheDir::new(&self.file_config.vector_store.cache_dir)
    }

    /// Empty similarity store wired to this embedder and cache directory.
    pub fn similarity_store(&self) -> SimilarityStore {
        let vs = &self.file_config.vector_store;
        SimilarityStore::new(self.embedder.clone(), Some(self.cache_dir())).with_text_fields(
            TextFields {
                display: vs.display_field.clone(),
                keywords: vs.keyword_field.clone(),
            },
        )
    }

    /// Fresh request memo using the configured TTL and this clock.
    pub fn memo_cache<V: Clone>(&self) -> MemoCache<V> {
        MemoCache::with_ttl_secs(
            self.file_config.orchestrator.cache_ttl_seconds,
            self.clock.clone(),
        )
    }
}

fn build_embedder(config: &AppConfig, file_config: &FileConfig) -> EmbeddingProvider {
    let models = &file_config.models;
    if config.disable_remote_embed {
        info!("Remote embeddings disabled, using hash vectors");
        return EmbeddingProvider::offline();
    }

    let timeout = Duration::from_secs(models.request_timeout_secs);
    let remote: Option<Arc<dyn EmbedAgent>> = match models.embedding_backend {
        EmbeddingBackend::Offline => None,
        EmbeddingBackend::Gemini => config.google_api_key.as_ref().map(|key| {
            Arc::new(
                Gemini::new(key.clone(), models.llm.clone())
                    .with_embedding_model(models.embedding.clone())
                    .with_timeout(timeout),
            ) as Arc<dyn EmbedAgent>
        }),
        EmbeddingBackend::OpenAi => config.openai_api_key.as_ref().map(|key| {
            let mut openai = OpenAi::new(key.clone(), models.openai_llm.clone())
                .with_embedding_model(models.embedding.clone())
                .with_timeout(timeout);
            if let Some(url) = &config.openai_base_url {
                openai = openai.with_base_url(url.clone());
            }
            Arc::new(openai) as Arc<dyn EmbedAgent>
        }),
    };

    match remote {
        Some(agent) => {
            info!(model = agent.embedding_model(), "Remote embeddings enabled");
            EmbeddingProvider::remote(agent)
        }
        None => {
            info!("No remote embedding backend, using hash vectors");
            EmbeddingProvider::offline()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn disabled_flag_forces_offline_embeddings() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "g-test"),
            ("DISABLE_REMOTE_EMBED", "true"),
        ]));
        assert!(!build_embedder(&config, &FileConfig::default()).has_remote());
    }

    #[test]
    fn gemini_key_enables_remote_embeddings() {
        let config = AppConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "g-test")]));
        let embedder = build_embedder(&config, &FileConfig::default());
        assert!(embedder.has_remote());
        assert_eq!(embedder.model_name(), "text-embedding-004");
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = AppConfig {
            config_path: path,
            ..AppConfig::default()
        };
        let deps = CounselDeps::from_config(config).unwrap();
        assert!(!deps.llm.is_available());
        assert!(!deps.embedder.has_remote());
        assert_eq!(deps.config_dir, dir.path());
        assert_eq!(deps.file_config.orchestrator.cache_ttl_seconds, 120);
    }

    #[test]
    fn config_file_paths_resolve_against_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counsel.toml");
        std::fs::write(&path, "[data]\nprograms = \"programs.json\"\n").unwrap();
        let deps = CounselDeps::from_config(AppConfig {
            config_path: path,
            ..AppConfig::default()
        })
        .unwrap();
        let programs = deps.file_config.data.programs.clone().unwrap();
        assert_eq!(deps.resolve_path(&programs), dir.path().join("programs.json"));
    }
}
