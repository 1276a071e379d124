use std::path::PathBuf;

/// Default location of the TOML file when `COUNSEL_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/counsel.toml";

/// Application configuration loaded from environment variables.
/// Contains only secrets and env-specific overrides; models, prompts,
/// pipeline switches and data paths live in the TOML FileConfig.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    // AI / LLM
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,

    /// `MODEL_NAME` / `LLM_MODEL`: overrides `[models].llm`.
    pub model_override: Option<String>,
    /// `ALT_MODELS`: comma-separated Gemini alternates.
    pub alt_models: Option<Vec<String>>,

    /// Skip the remote embedding model and use hash vectors only.
    pub disable_remote_embed: bool,

    pub config_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok());
        config.log_keys();
        config
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        Self {
            google_api_key: non_empty("GOOGLE_API_KEY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL"),
            model_override: non_empty("MODEL_NAME").or_else(|| non_empty("LLM_MODEL")),
            alt_models: non_empty("ALT_MODELS").map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            disable_remote_embed: ["DISABLE_REMOTE_EMBED", "DISABLE_VERTEX_EMBED"]
                .iter()
                .any(|key| get(key).map(|v| parse_flag(&v)).unwrap_or(false)),
            config_path: non_empty("COUNSEL_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.chars().take(5).map(char::len_utf8).sum::<usize>();
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  GOOGLE_API_KEY: {}", preview_opt(&self.google_api_key));
        tracing::info!("  OPENAI_API_KEY: {}", preview_opt(&self.openai_api_key));
        tracing::info!("  MODEL override: {}", self.model_override.as_deref().unwrap_or("<not set>"));
        tracing::info!("  remote embeddings disabled: {}", self.disable_remote_embed);
        tracing::info!("  config file: {}", self.config_path.display());
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
