//! Text embeddings with a deterministic offline fallback.
//!
//! The remote model is preferred. Any failure (network, auth, a response with
//! the wrong vector count) degrades to SHA-256 hash vectors so the similarity
//! store keeps working without credentials.

use std::sync::Arc;

use ai_client::EmbedAgent;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Length of a fallback vector (one component per digest byte).
pub const FALLBACK_DIMENSION: usize = 32;

/// Model name reported for hash vectors.
pub const FALLBACK_MODEL: &str = "sha256-fallback";

/// Which path produced a batch of vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    Remote,
    Fallback,
}

/// Hash-derived embedding: each SHA-256 digest byte scaled into `[0, 1]`.
/// Identical text yields a bit-identical vector on every run.
pub fn fallback_embed(text: &str) -> Vec<f32> {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|&b| b as f32 / 255.0)
        .collect()
}

/// Cosine similarity computed in f64. Returns 0.0 for empty, zero-norm or
/// different-length inputs, and for non-finite components.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Infallible embedding front-end over an optional remote [`EmbedAgent`].
#[derive(Clone)]
pub struct EmbeddingProvider {
    remote: Option<Arc<dyn EmbedAgent>>,
}

impl EmbeddingProvider {
    /// Hash vectors only.
    pub fn offline() -> Self {
        Self { remote: None }
    }

    pub fn remote(agent: Arc<dyn EmbedAgent>) -> Self {
        Self {
            remote: Some(agent),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Name of the configured embedding model, or [`FALLBACK_MODEL`].
    pub fn model_name(&self) -> &str {
        self.remote
            .as_deref()
            .map(|r| r.embedding_model())
            .unwrap_or(FALLBACK_MODEL)
    }

    /// One vector per input text, in input order. Never fails.
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        self.embed_with_source(texts).await.0
    }

    /// Like [`embed`](Self::embed), also reporting whether the remote model
    /// answered or the batch degraded to hash vectors.
    pub async fn embed_with_source(&self, texts: &[String]) -> (Vec<Vec<f32>>, EmbeddingSource) {
        if texts.is_empty() {
            let source = if self.has_remote() {
                EmbeddingSource::Remote
            } else {
                EmbeddingSource::Fallback
            };
            return (Vec::new(), source);
        }

        if let Some(remote) = &self.remote {
            match remote.embed_batch(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => {
                    debug!(count = vectors.len(), model = remote.embedding_model(), "Remote embeddings");
                    return (vectors, EmbeddingSource::Remote);
                }
                Ok(vectors) => {
                    warn!(
                        sent = texts.len(),
                        received = vectors.len(),
                        "Embedding count mismatch, using fallback vectors"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Remote embedding failed, using fallback vectors");
                }
            }
        }

        let vectors = texts.iter().map(|t| fallback_embed(t)).collect();
        (vectors, EmbeddingSource::Fallback)
    }
}

impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("model", &self.model_name())
            .finish()
    }
}
