//! Pulling structured data out of free-text LLM answers.

use ai_client::strip_code_blocks;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("LLM response was empty")]
    Empty,

    #[error("LLM response is not a JSON array: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a JSON array out of an LLM answer. Markdown code fences are removed;
/// if the remaining text still carries prose around the array, the outermost
/// `[...]` span is tried.
pub fn parse_json_array<T: DeserializeOwned>(response: &str) -> Result<Vec<T>, ParseError> {
    let cleaned = strip_code_blocks(response)
        .replace("```json", "")
        .replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }

    match serde_json::from_str(cleaned) {
        Ok(items) => Ok(items),
        Err(e) => match (cleaned.find('['), cleaned.rfind(']')) {
            (Some(start), Some(end)) if start < end => {
                Ok(serde_json::from_str(&cleaned[start..=end])?)
            }
            _ => Err(ParseError::Json(e)),
        },
    }
}

/// Deserialize a free-text field the model may have answered as a string,
/// number, list or null. Lists are joined with ", "; null becomes "".
pub fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_text(&Value::deserialize(deserializer)?))
}

/// Numeric field that may arrive as a number or a numeric string.
pub fn loose_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn parses_fenced_array() {
        let text = "```json\n[{\"name\": \"a\"}, {\"name\": \"b\"}]\n```";
        let items: Vec<Named> = parse_json_array(text).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "b");
    }

    #[test]
    fn parses_array_wrapped_in_prose() {
        let text = "Here you go:\n[{\"name\": \"a\"}]\nGood luck!";
        let items: Vec<Named> = parse_json_array(text).unwrap();
        assert_eq!(items, vec![Named { name: "a".into() }]);
    }

    #[test]
    fn blank_and_garbage_are_errors() {
        assert!(matches!(parse_json_array::<Named>("  "), Err(ParseError::Empty)));
        assert!(matches!(
            parse_json_array::<Named>("not json at all"),
            Err(ParseError::Json(_))
        ));
        assert!(parse_json_array::<Named>("{\"name\": \"a\"}").is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Loose {
        #[serde(default, deserialize_with = "loose_text")]
        text: String,
        #[serde(default, deserialize_with = "loose_f64")]
        score: Option<f64>,
    }

    #[test]
    fn loose_fields_accept_model_variations() {
        let items: Vec<Loose> = parse_json_array(
            r#"[{"text": ["a", "b"], "score": "0.8"}, {"text": 3, "score": 0.5}, {"text": null}, {}]"#,
        )
        .unwrap();
        assert_eq!(items[0].text, "a, b");
        assert_eq!(items[0].score, Some(0.8));
        assert_eq!(items[1].text, "3");
        assert_eq!(items[1].score, Some(0.5));
        assert_eq!(items[2].text, "");
        assert_eq!(items[3].score, None);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        assert!(parse_json_array::<Named>("[{\"title\": \"x\"}]").is_err());
    }
}
