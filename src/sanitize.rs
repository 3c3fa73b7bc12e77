//! Text cleanup before prompt assembly
//!
//! Model gateways reject or mangle payloads carrying stray control bytes,
//! and whitespace runs burn tokens for nothing. Everything sent to the
//! endpoint passes through here first.

use regex::Regex;
use std::sync::OnceLock;

static NEWLINE_RUNS: OnceLock<Regex> = OnceLock::new();
static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();

/// Control characters stripped from payload text. Newlines, carriage
/// returns and tabs survive; everything else in C0/C1 plus DEL goes.
fn is_stripped_control(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{0008}'
        | '\u{000B}'
        | '\u{000C}'
        | '\u{000E}'..='\u{001F}'
        | '\u{007F}'..='\u{009F}')
}

/// Remove control characters and collapse redundant whitespace:
/// 3+ consecutive newlines become 2, runs of spaces/tabs become one space.
pub fn sanitize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let stripped: String = text.chars().filter(|c| !is_stripped_control(*c)).collect();

    let newline_runs = NEWLINE_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern"));
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("static pattern"));

    let collapsed = newline_runs.replace_all(&stripped, "\n\n");
    blank_runs.replace_all(&collapsed, " ").into_owned()
}

/// Truncate content to at most `max_chars` characters of original text by
/// keeping the head and tail halves and marking how much was elided.
///
/// Char-based, not byte-based, so multi-byte text never splits mid-glyph.
pub fn truncate_middle(content: &str, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content.to_string();
    }

    let half = max_chars / 2;
    let head: String = content.chars().take(half).collect();
    let tail_rev: String = content.chars().rev().take(half).collect();
    let tail: String = tail_rev.chars().rev().collect();

    format!(
        "{}\n\n...[内容过长，为防止超出模型上限，中间 {} 字已省略]...\n\n{}",
        head,
        total - max_chars,
        tail
    )
}

#[cfg(test)]
mod tests {
    use super::{sanitize_text, truncate_middle};

    #[test]
    fn test_strips_null_and_collapses_newlines() {
        let dirty = "a\u{0000}b\n\n\n\n\nc";
        let clean = sanitize_text(dirty);
        assert!(!clean.contains('\u{0000}'));
        assert_eq!(clean, "ab\n\nc");
    }

    #[test]
    fn test_keeps_newlines_and_tabs() {
        let text = "line1\nline2\tend";
        assert_eq!(sanitize_text(text), "line1\nline2\tend");
    }

    #[test]
    fn test_collapses_space_runs_to_single_space() {
        assert_eq!(sanitize_text("a    b\t\tc"), "a b c");
    }

    #[test]
    fn test_strips_c1_range() {
        let dirty = "ok\u{0085}ok\u{009F}ok";
        assert_eq!(sanitize_text(dirty), "okokok");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize_text(""), "");
    }

    #[test]
    fn test_truncate_keeps_head_and_tail_verbatim() {
        let content: String = (0..10_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let truncated = truncate_middle(&content, 6000);

        let head: String = content.chars().take(3000).collect();
        let tail: String = content.chars().skip(10_000 - 3000).collect();
        assert!(truncated.starts_with(&head));
        assert!(truncated.ends_with(&tail));
        assert!(truncated.contains("4000 字已省略"));

        // 6000 kept chars plus the marker, nothing more
        let marker_budget = 80;
        assert!(truncated.chars().count() <= 6000 + marker_budget);
    }

    #[test]
    fn test_truncate_noop_under_limit() {
        let content = "short document";
        assert_eq!(truncate_middle(content, 6000), content);
    }

    #[test]
    fn test_truncate_char_safe_on_cjk() {
        let content: String = "隐私合规".chars().cycle().take(8000).collect();
        let truncated = truncate_middle(&content, 6000);
        // must not split a multi-byte char: result is valid UTF-8 by
        // construction, so just confirm the kept halves are intact
        let head: String = content.chars().take(3000).collect();
        assert!(truncated.starts_with(&head));
        assert!(truncated.contains("2000 字已省略"));
    }
}
