// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Small text helpers shared by prompts, memories, and search.

/// Truncates `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Lowercased alphanumeric tokens of `text`, in order.
///
/// Underscores are kept inside tokens so identifiers like `Camera_03`
/// survive as one token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .map(|t| t.trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("สวัสดีครับ", 3), "สวั");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 0), "");
    }

    #[test]
    fn tokenize_keeps_identifiers_and_decimals() {
        assert_eq!(
            tokenize("Camera_03 failed, pass rate 71.4%."),
            vec!["camera_03", "failed", "pass", "rate", "71.4"]
        );
    }
}
