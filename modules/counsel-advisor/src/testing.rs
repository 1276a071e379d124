// Test mocks for the counseling pipeline.
//
// Three mocks matching the trait boundaries:
// - MockGenerator (TextGenerator): canned answers keyed by prompt substring
// - FixedEmbedder (EmbedAgent): registered vectors, hash-based otherwise
// - FailingStep (ReasoningStep): always errors
//
// Plus `test_deps` for building a CounselDeps rooted in a temp directory.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ai_client::{AiError, AiResult, EmbedAgent, TextGenerator};
use anyhow::{bail, Result};
use async_trait::async_trait;
use counsel_core::{
    AppConfig, Clock, CounselDeps, EmbeddingProvider, FileConfig, LlmService, PromptRegistry,
};

use crate::report::StepOutput;
use crate::steps::{ReasoningStep, StepRequest};

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Answers with the first registered response whose needle occurs in the
/// prompt. Unmatched prompts fail like an unreachable backend.
#[derive(Default)]
pub struct MockGenerator {
    responses: Vec<(String, String)>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_prompt(mut self, needle: &str, response: &str) -> Self {
        self.responses.push((needle.to_string(), response.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn backend(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> AiResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| AiError::Network("mock: no response registered".into()))
    }
}

// ---------------------------------------------------------------------------
// FixedEmbedder
// ---------------------------------------------------------------------------

/// Deterministic embedder. Registered texts get exact vectors; a text that
/// contains a registered keyword gets that keyword's vector; anything else
/// gets a unit hash vector (low similarity to everything).
pub struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    keywords: Vec<(String, Vec<f32>)>,
    dimension: usize,
}

impl FixedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            keywords: Vec::new(),
            dimension,
        }
    }

    /// Register a text→vector mapping for controlled similarity.
    pub fn on_text(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Any text containing `keyword` (case-insensitive) embeds as `vector`.
    pub fn on_keyword(mut self, keyword: &str, vector: Vec<f32>) -> Self {
        self.keywords.push((keyword.to_lowercase(), vector));
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.vectors.get(text) {
            return v.clone();
        }
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|(k, _)| lower.contains(k.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.hash_vector(text))
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish();

        let mut vec = vec![0.0f32; self.dimension];
        for v in vec.iter_mut() {
            // LCG
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            *v = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbedAgent for FixedEmbedder {
    fn embedding_model(&self) -> &str {
        "fixed-test"
    }

    async fn embed_batch(&self, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

// ---------------------------------------------------------------------------
// FailingStep
// ---------------------------------------------------------------------------

pub struct FailingStep {
    name: String,
    message: String,
}

impl FailingStep {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ReasoningStep for FailingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, _request: &StepRequest<'_>) -> Result<StepOutput> {
        bail!("{}", self.message)
    }
}

// ---------------------------------------------------------------------------
// Deps helper
// ---------------------------------------------------------------------------

/// Deps with built-in prompts, the given backends and every on-disk path
/// (vector cache, exports) under `root`.
pub fn test_deps(
    root: &Path,
    llm: LlmService,
    embedder: EmbeddingProvider,
    clock: Arc<dyn Clock>,
) -> CounselDeps {
    let mut file_config = FileConfig::default();
    file_config.vector_store.cache_dir = root.join("vector_cache");
    file_config.orchestrator.export_dir = root.join("exports");
    let prompts = PromptRegistry::load(&file_config, root).unwrap_or_else(|e| panic!("{e:#}"));

    CounselDeps::new(
        llm,
        embedder,
        Arc::new(prompts),
        AppConfig::default(),
        Arc::new(file_config),
        root.to_path_buf(),
    )
    .with_clock(clock)
}
