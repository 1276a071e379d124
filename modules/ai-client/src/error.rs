use thiserror::Error;

use crate::util::truncate_to_char_boundary;

const MAX_ERROR_BODY_BYTES: usize = 2048;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend answered but produced no usable content.
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Embedding count mismatch: sent {sent} texts, got {received} vectors")]
    EmbeddingCount { sent: usize, received: usize },
}

pub type AiResult<T> = std::result::Result<T, AiError>;

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for AiError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        AiError::Config(format!("invalid header value: {e}"))
    }
}

/// Turn a non-2xx response into an `AiError::Api`, draining the body for context.
pub(crate) async fn check_status(response: reqwest::Response) -> AiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AiError::Api {
        status: status.as_u16(),
        body: truncate_to_char_boundary(&body, MAX_ERROR_BODY_BYTES).to_string(),
    })
}
