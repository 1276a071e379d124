pub mod catalog;
pub mod config;
pub mod deps;
pub mod embedding;
pub mod error;
pub mod file_config;
pub mod hashing;
pub mod llm;
pub mod memo;
pub mod prompt_registry;
pub mod template;
pub mod types;
pub mod vector_store;

pub use config::AppConfig;
pub use deps::CounselDeps;
pub use embedding::{cosine_similarity, fallback_embed, EmbeddingProvider, EmbeddingSource};
pub use error::{CacheError, CatalogError};
pub use file_config::FileConfig;
pub use llm::LlmService;
pub use memo::{Clock, ManualClock, MemoBuilder, MemoCache, Memoized, SystemClock};
pub use prompt_registry::PromptRegistry;
pub use types::*;
pub use vector_store::{AddOutcome, CacheDir, SimilarityStore, TextFields};
