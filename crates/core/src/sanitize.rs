//! Filesystem- and key-safe names derived from title names.
//!
//! The same function feeds directory names and job keys, so a title always
//! maps to one directory and one key namespace.

/// Characters rejected by at least one common filesystem.
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Name used when nothing survives sanitization.
const FALLBACK: &str = "untitled";

/// Sanitize a display name into a filesystem- and key-safe string.
///
/// Reserved characters and control characters are dropped, runs of whitespace
/// collapse to a single space, and leading/trailing dots and spaces are
/// trimmed. Case is preserved.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;

    for c in name.chars() {
        if c.is_control() || RESERVED.contains(&c) {
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c: char| c == '.' || c == ' ');
    if trimmed.is_empty() {
        FALLBACK.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_is_unchanged() {
        assert_eq!(sanitize("Alpha"), "Alpha");
    }

    #[test]
    fn test_reserved_characters_are_removed() {
        assert_eq!(sanitize("Who/What: Part?*"), "WhoWhat Part");
        assert_eq!(sanitize(r#"a\b|c"d<e>"#), "abcde");
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(sanitize("  One   Piece\t\n"), "One Piece");
    }

    #[test]
    fn test_trailing_dots_trimmed() {
        assert_eq!(sanitize("Wait..."), "Wait");
        assert_eq!(sanitize("..hidden"), "hidden");
    }

    #[test]
    fn test_control_characters_removed() {
        assert_eq!(sanitize("Be\u{0007}ta"), "Beta");
    }

    #[test]
    fn test_empty_result_falls_back() {
        assert_eq!(sanitize("///"), "untitled");
        assert_eq!(sanitize(""), "untitled");
    }

    #[test]
    fn test_unicode_preserved() {
        assert_eq!(sanitize("進撃の巨人"), "進撃の巨人");
    }
}
