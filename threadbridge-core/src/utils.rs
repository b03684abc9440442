// ABOUTME: Small text helpers shared by the dispatcher.
// ABOUTME: Whitespace collapsing and char-boundary-safe truncation.

/// Maximum reply length posted to Slack (chars)
pub const MAX_REPLY_CHARS: usize = 3500;

/// Collapse every whitespace run into a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
