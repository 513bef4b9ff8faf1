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

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse a JSON object out of model output. Tries the whole (fence-stripped)
/// text first, then the span from the first `{` to the last `}`.
pub fn salvage_json_object(raw: &str) -> Option<serde_json::Value> {
    let cleaned = strip_code_blocks(raw);
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&cleaned[start..=end])
        .ok()
        .filter(|v| v.is_object())
}
