use serde::{Deserialize, Serialize};

// =============================================================================
// generateContent
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// First non-empty text part across all candidates.
    pub fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .find(|text| !text.trim().is_empty())
    }
}

// =============================================================================
// batchEmbedContents
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct EmbedContentRequest {
    pub model: String,
    pub content: Content,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchEmbedRequest {
    pub requests: Vec<EmbedContentRequest>,
}

impl BatchEmbedRequest {
    pub fn new(model: &str, texts: &[String]) -> Self {
        let model = format!("models/{model}");
        Self {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model.clone(),
                    content: Content::plain(text.as_str()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchEmbedResponse {
    #[serde(default)]
    pub embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEmbedding {
    pub values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_skips_empty_candidates() {
        let raw = r#"{"candidates": [
            {"content": {"role": "model", "parts": [{"text": ""}]}},
            {"content": {"role": "model", "parts": [{"text": "hello"}]}}
        ]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("hello"));
    }

    #[test]
    fn missing_candidates_yield_none() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.first_text().is_none());
    }

    #[test]
    fn batch_request_prefixes_model_path() {
        let request = BatchEmbedRequest::new("text-embedding-004", &["a".into(), "b".into()]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][1]["content"]["parts"][0]["text"], "b");
    }
}
