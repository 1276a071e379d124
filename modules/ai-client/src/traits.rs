use async_trait::async_trait;

use crate::error::AiResult;

// =============================================================================
// TextGenerator Trait
// =============================================================================

/// Single-prompt text generation. The counselor pipeline only ever sends one
/// user prompt and reads back free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend label used in logs (e.g. "gemini", "openai").
    fn backend(&self) -> &str;

    async fn generate(&self, prompt: &str) -> AiResult<String>;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    /// Model identifier. The similarity cache stores it with each entry and
    /// ignores entries written by a different model.
    fn embedding_model(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> AiResult<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> AiResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.len() {
            1 => Ok(vectors.remove(0)),
            n => Err(crate::error::AiError::EmbeddingCount {
                sent: 1,
                received: n,
            }),
        }
    }
}
