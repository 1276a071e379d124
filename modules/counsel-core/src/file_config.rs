use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML-backed configuration loaded from disk.
/// Secrets (API keys) stay as env vars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub identity: IdentityConfig,
    pub models: ModelsConfig,
    pub orchestrator: OrchestratorConfig,
    pub agents: AgentsConfig,
    pub vector_store: VectorStoreConfig,
    pub data: DataConfig,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub region: String,
    pub system_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            region: "Singapore".to_string(),
            system_name: "Education Counselor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    /// Hash vectors only.
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub llm: String,
    pub openai_llm: String,
    /// Text generation backends, tried in order.
    pub providers: Vec<Provider>,
    pub embedding: String,
    pub embedding_backend: EmbeddingBackend,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            llm: "gemini-1.5-flash".to_string(),
            openai_llm: "gpt-4o-mini".to_string(),
            providers: vec![Provider::Gemini, Provider::OpenAi],
            embedding: "text-embedding-004".to_string(),
            embedding_backend: EmbeddingBackend::Gemini,
            temperature: 0.2,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub summarizer: bool,
    pub cache_ttl_seconds: u64,
    pub use_vector_store: bool,
    pub export_dir: PathBuf,
    /// Candidates pulled from the similarity store per request.
    pub search_top_k: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            summarizer: false,
            cache_ttl_seconds: 120,
            use_vector_store: true,
            export_dir: PathBuf::from("exports"),
            search_top_k: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub enabled: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                "institutional_data".to_string(),
                "career_guidance".to_string(),
                "financial_aid".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub cache_dir: PathBuf,
    pub use_cache: bool,
    pub display_field: String,
    pub keyword_field: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".vector_cache"),
            use_cache: true,
            display_field: "program".to_string(),
            keyword_field: "keywords".to_string(),
        }
    }
}

/// Catalog files. Unset paths fall back to the built-in demo data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub programs: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_aid: Option<PathBuf>,
}

/// Prompt template overrides. Unset paths use the compiled-in templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_fit: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_guidance: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financial_aid: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PathBuf>,
}

impl FileConfig {
    /// Effective config as a TOML tree, defaults included, for `{{config.*}}`
    /// template variables.
    pub fn to_toml_value(&self) -> Result<toml::Value> {
        toml::Value::try_from(self).context("Failed to convert config to a TOML value")
    }

    /// Resolve a path from this config relative to the config file's directory.
    pub fn resolve_path(config_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.join(path)
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

/// Load the config file if present, otherwise defaults.
pub fn load_or_default(path: &Path) -> Result<FileConfig> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        Ok(FileConfig::default())
    }
}
