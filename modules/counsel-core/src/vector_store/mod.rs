//! In-process similarity store over catalog items.
//!
//! Items and their embeddings live in parallel vectors that only ever grow
//! (until [`SimilarityStore::clear`]). Batches added with caching enabled are
//! persisted under a content-derived key so a restart with the same catalog
//! skips the embedding call entirely.

mod cache;

pub use cache::{CacheDir, CacheEntry, CacheFileInfo, ValidationReport, CACHE_FILE_PREFIX};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::embedding::{cosine_similarity, EmbeddingProvider, EmbeddingSource};
use crate::error::CatalogError;
use crate::hashing::canonicalize;
use crate::types::{CatalogItem, SearchHit};

/// Hex characters of the SHA-256 kept in cache file names.
const CACHE_KEY_LEN: usize = 16;

/// Which item fields make up the text that gets embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFields {
    /// Required string field, also the sort key for cache hashing.
    pub display: String,
    /// Optional list-of-strings field appended after the display text.
    pub keywords: String,
}

impl Default for TextFields {
    fn default() -> Self {
        Self {
            display: "program".to_string(),
            keywords: "keywords".to_string(),
        }
    }
}

/// What `add_items` did with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Nothing to add.
    Empty,
    /// Vectors came from the on-disk cache; no embedding call was made.
    CacheHit { count: usize },
    /// Vectors were computed; `cached` is true when they were persisted.
    /// Hash vectors standing in for a failed remote model are never persisted.
    Embedded { count: usize, cached: bool },
}

pub struct SimilarityStore {
    embedder: EmbeddingProvider,
    cache: Option<CacheDir>,
    fields: TextFields,
    items: Vec<CatalogItem>,
    embeddings: Vec<Vec<f32>>,
}

impl SimilarityStore {
    /// `cache = None` disables persistence regardless of `use_cache`.
    pub fn new(embedder: EmbeddingProvider, cache: Option<CacheDir>) -> Self {
        Self {
            embedder,
            cache,
            fields: TextFields::default(),
            items: Vec::new(),
            embeddings: Vec::new(),
        }
    }

    pub fn with_text_fields(mut self, fields: TextFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn text_fields(&self) -> &TextFields {
        &self.fields
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.embeddings.clear();
    }

    /// Embed and append a batch. Cache problems are logged and never returned;
    /// a malformed item is returned as [`CatalogError`] before anything changes.
    pub async fn add_items(
        &mut self,
        items: Vec<CatalogItem>,
        use_cache: bool,
    ) -> Result<AddOutcome, CatalogError> {
        if items.is_empty() {
            return Ok(AddOutcome::Empty);
        }

        let texts = item_texts(&items, &self.fields)?;
        let cache = self.cache.as_ref().filter(|_| use_cache);
        let key = cache_key(&items, &self.fields.display);
        let model = self.embedder.model_name().to_string();

        if let Some(cache) = cache {
            match cache.load(&key, items.len(), &model) {
                Ok(Some(entry)) => {
                    let count = entry.items.len();
                    self.append(entry.items, entry.embeddings);
                    info!(count, key = %key, "Loaded catalog vectors from cache");
                    return Ok(AddOutcome::CacheHit { count });
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Ignoring unusable cache entry"),
            }
        }

        let (embeddings, source) = self.embedder.embed_with_source(&texts).await;
        let degraded = source == EmbeddingSource::Fallback && self.embedder.has_remote();
        let count = items.len();

        let cached = match cache {
            Some(_) if degraded => {
                warn!(key = %key, model = %model, "Remote embeddings unavailable, not caching fallback vectors");
                false
            }
            Some(cache) => match cache.store(&key, &model, &items, &embeddings) {
                Ok(_) => true,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to write embedding cache");
                    false
                }
            },
            None => false,
        };

        self.append(items, embeddings);
        info!(count, model = %model, ?source, cached, "Embedded catalog items");
        Ok(AddOutcome::Embedded { count, cached })
    }

    /// Top `top_k` items by cosine similarity to `query`, best first. Ties keep
    /// insertion order. Scores are rounded to 4 decimal places.
    pub async fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if self.items.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<(usize, f64)> = self
            .embeddings
            .iter()
            .map(|e| cosine_similarity(&query_vector, e))
            .enumerate()
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(idx, score)| SearchHit {
                item: self.items[idx].clone(),
                score: round4(score),
                query: query.to_string(),
            })
            .collect()
    }

    fn append(&mut self, items: Vec<CatalogItem>, embeddings: Vec<Vec<f32>>) {
        debug_assert_eq!(items.len(), embeddings.len());
        self.items.extend(items);
        self.embeddings.extend(embeddings);
    }
}

/// Content key for a batch: first 16 hex chars of the SHA-256 of the canonical
/// JSON of the items sorted by `display_field`, ties broken by each item's
/// canonical JSON. Independent of input order.
pub fn cache_key(items: &[CatalogItem], display_field: &str) -> String {
    let mut sorted: Vec<(&str, String)> = items
        .iter()
        .map(|item| {
            let canonical = canonicalize(&Value::Object(item.clone())).to_string();
            (display_of(item, display_field), canonical)
        })
        .collect();
    sorted.sort();

    let canonical = format!(
        "[{}]",
        sorted
            .iter()
            .map(|(_, json)| json.as_str())
            .collect::<Vec<_>>()
            .join(",")
    );
    let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
    digest[..CACHE_KEY_LEN].to_string()
}

fn display_of<'a>(item: &'a CatalogItem, field: &str) -> &'a str {
    item.get(field).and_then(Value::as_str).unwrap_or("")
}

/// `"<display> <kw1 kw2 ...>"` per item.
fn item_texts(items: &[CatalogItem], fields: &TextFields) -> Result<Vec<String>, CatalogError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let display = item
                .get(&fields.display)
                .and_then(Value::as_str)
                .ok_or_else(|| CatalogError::MissingField {
                    index,
                    field: fields.display.clone(),
                })?;

            let keywords = match item.get(&fields.keywords) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(values)) => values
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Option<Vec<&str>>>()
                    .ok_or_else(|| CatalogError::InvalidKeywords {
                        index,
                        field: fields.keywords.clone(),
                    })?,
                Some(_) => {
                    return Err(CatalogError::InvalidKeywords {
                        index,
                        field: fields.keywords.clone(),
                    })
                }
            };

            Ok(format!("{} {}", display, keywords.join(" ")))
        })
        .collect()
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
