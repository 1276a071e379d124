//! Typed errors for catalog input and the embedding cache.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed catalog input. These indicate a misconfigured deployment and
/// propagate to the caller.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Item lacks the string field used as its display name
    #[error("catalog item {index} is missing string field `{field}`")]
    MissingField { index: usize, field: String },

    /// Keyword field present but not a list of strings
    #[error("catalog item {index} field `{field}` must be a list of strings")]
    InvalidKeywords { index: usize, field: String },

    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Neither a top-level list nor an object with a `programs` list
    #[error("catalog {path} does not contain a list of programs")]
    Shape { path: PathBuf },
}

/// On-disk embedding cache failures. Always recovered by recomputing.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File parsed but violates the items/embeddings invariants
    #[error("invalid cache entry: {0}")]
    Shape(String),

    /// Vectors were produced by a different embedding model
    #[error("cached vectors are from model `{cached}`, expected `{expected}`")]
    ModelMismatch { cached: String, expected: String },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
