use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::error::{check_status, AiError, AiResult};

pub(crate) const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub(crate) struct GeminiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> AiResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.to_string(),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn headers(&self) -> AiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn generate(&self, model: &str, request: &GenerateRequest) -> AiResult<Option<String>> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        debug!(model, "Gemini generateContent request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let parsed: GenerateResponse = check_status(response).await?.json().await?;
        Ok(parsed.first_text())
    }

    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
        let url = format!("{}/models/{}:batchEmbedContents", self.base_url, model);

        debug!(model, count = texts.len(), "Gemini batch embedding request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&BatchEmbedRequest::new(model, texts))
            .send()
            .await?;

        let parsed: BatchEmbedResponse = check_status(response).await?.json().await?;
        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.values).collect();

        if vectors.len() != texts.len() {
            return Err(AiError::EmbeddingCount {
                sent: texts.len(),
                received: vectors.len(),
            });
        }
        Ok(vectors)
    }
}
