/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code fences from a model response.
///
/// Handles a leading ```` ```json ```` / ```` ``` ```` line, a trailing fence,
/// and fence lines that appear after a short preamble.
pub fn strip_code_blocks(response: &str) -> String {
    let trimmed = response.trim();
    if !trimmed.contains("```") {
        return trimmed.to_string();
    }
    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn truncate_within_bounds() {
        assert_eq!(truncate_to_char_boundary("Hello", 100), "Hello");
    }

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_blocks("```json\n[]\n```"), "[]");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  {}  "), "{}");
    }

    #[test]
    fn strips_fences_after_preamble() {
        let raw = "Here you go:\n```json\n[{\"a\": 1}]\n```\n";
        assert_eq!(strip_code_blocks(raw), "Here you go:\n[{\"a\": 1}]");
    }
}
