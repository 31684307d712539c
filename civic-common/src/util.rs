//! Utility functions shared by the Civic Desk crates.

/// Truncate a string to at most `max_chars` characters.
///
/// Works on character boundaries so multi-byte text (emoji, accents) is never
/// split. Strings already within the limit are returned unchanged.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
