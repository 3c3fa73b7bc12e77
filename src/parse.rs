//! JSON recovery from model output
//!
//! Models answer with raw JSON, fenced code blocks, or JSON buried in
//! prose. Recovery runs an ordered chain of extraction strategies; the
//! first candidate that parses wins. Each strategy is pure and does no
//! validation beyond "parses as JSON" — shape checks belong to the caller.

use serde_json::Value;

/// Recover a JSON value from free-form model output.
///
/// Strategy order: the whole text, then the first fenced code block
/// (```json or bare ```), then the widest bracketed array span.
pub fn recover_json(text: &str) -> Option<Value> {
    let candidates = [
        Some(text.trim()),
        fenced_block(text),
        array_span(text),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Some(value);
        }
    }
    None
}

/// Contents of the first fenced code block, with an optional `json` label.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let body = &text[start + 3..];
    let body = body.strip_prefix("json").unwrap_or(body);
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Widest span that looks like a top-level array of objects: from the
/// first `[` directly followed by `{` to the last `]`.
fn array_span(text: &str) -> Option<&str> {
    let mut start = None;
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'[' {
            let rest = text[i + 1..].trim_start();
            if rest.starts_with('{') {
                start = Some(i);
                break;
            }
        }
    }
    let start = start?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_parse() {
        let value = recover_json(r#"[{"hit": true}]"#).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_fenced_json_block() {
        let response = "```json\n[{\"hit\": false}]\n```";
        let value = recover_json(response).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unlabeled_fence() {
        let response = "```\n[{\"hit\": true}]\n```";
        assert!(recover_json(response).unwrap().is_array());
    }

    #[test]
    fn test_array_embedded_in_prose() {
        let response = "根据分析，结果如下：\n[{\"hit\": true, \"reason\": \"越权\"}]\n请复核。";
        let value = recover_json(response).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_prose_with_fence_and_trailing_text() {
        let response = "好的，这是结果：\n```json\n[{\"sourceName\": \"a.txt\"}]\n```\n以上。";
        let value = recover_json(response).unwrap();
        assert_eq!(value[0]["sourceName"], "a.txt");
    }

    #[test]
    fn test_object_is_still_recovered() {
        // shape validation happens later; an object must survive recovery
        let value = recover_json(r#"{"not": "an array"}"#).unwrap();
        assert!(value.is_object());
    }

    #[test]
    fn test_unparseable_output() {
        assert!(recover_json("模型超载，请稍后再试").is_none());
        assert!(recover_json("").is_none());
    }

    #[test]
    fn test_bare_bracket_noise_is_not_an_array_span() {
        // '[' without a following '{' (e.g. citation markers) must not match
        assert!(recover_json("见附录[1]与[2]").is_none());
    }

    #[test]
    fn test_multiline_array_in_fence_with_inner_brackets() {
        let response = "```json\n[\n  {\"suggest\": [\"a\", \"b\", \"c\"]}\n]\n```";
        let value = recover_json(response).unwrap();
        assert_eq!(value[0]["suggest"].as_array().unwrap().len(), 3);
    }
}
