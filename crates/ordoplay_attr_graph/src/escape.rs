// SPDX-License-Identifier: MIT OR Apache-2.0
//! Line escaping for text values.
//!
//! The stream is strictly line oriented, so line breaks inside a value are
//! written as two-character escapes. Backslashes are escaped too so text that
//! already contains a literal `\n` pair survives unchanged.

use std::borrow::Cow;

/// Escape `\`, LF and CR
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(&['\\', '\n', '\r'][..]) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Reverse [`escape`]
pub fn unescape(text: &str) -> Result<Cow<'_, str>, InvalidEscape> {
    if !text.contains('\\') {
        return Ok(Cow::Borrowed(text));
    }

    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '\\')) => unescaped.push('\\'),
            Some((_, 'n')) => unescaped.push('\n'),
            Some((_, 'r')) => unescaped.push('\r'),
            _ => return Err(InvalidEscape { offset }),
        }
    }
    Ok(Cow::Owned(unescaped))
}

/// An escape sequence that [`escape`] never produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid escape sequence at byte {offset}")]
pub struct InvalidEscape {
    /// Byte offset of the backslash within the value
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(escape("apple"), Cow::Borrowed("apple")));
        assert!(matches!(unescape("apple"), Ok(Cow::Borrowed("apple"))));
    }

    #[test]
    fn test_escape_line_breaks() {
        assert_eq!(escape("a\nb\r\nc"), "a\\nb\\r\\nc");
        assert_eq!(unescape("a\\nb\\r\\nc").unwrap(), "a\nb\r\nc");
    }

    #[test]
    fn test_literal_backslash_sequence() {
        let text = "path\\new \"quoted\"\n";
        let escaped = escape(text);
        assert!(!escaped.contains('\n'));
        assert_eq!(unescape(&escaped).unwrap(), text);
    }

    #[test]
    fn test_invalid_escape() {
        assert_eq!(unescape("ab\\t"), Err(InvalidEscape { offset: 2 }));
        assert_eq!(unescape("trailing\\"), Err(InvalidEscape { offset: 8 }));
    }
}
