use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::error::{check_status, AiError, AiResult};

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
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
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> AiResult<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "OpenAI chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> AiResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        debug!(model, count = texts.len(), "OpenAI embedding request");

        let request = EmbeddingRequest { model, input: texts };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let parsed: EmbeddingResponse = check_status(response).await?.json().await?;
        let vectors = parsed.into_vectors();

        if vectors.len() != texts.len() {
            return Err(AiError::EmbeddingCount {
                sent: texts.len(),
                received: vectors.len(),
            });
        }
        Ok(vectors)
    }
}
