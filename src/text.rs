//! Character-offset string helpers
//!
//! Logged offsets count Unicode scalar values, not UTF-8 bytes. These helpers
//! convert character offsets into byte ranges so the running text can stay a
//! plain `String`.

use std::ops::Range;

/// Number of characters in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the character at `char_idx`
///
/// `char_idx == char_len(text)` maps to `text.len()`. Returns `None` past the end.
pub fn byte_offset(text: &str, char_idx: usize) -> Option<usize> {
    if char_idx == 0 {
        return Some(0);
    }
    let mut seen = 0;
    for (byte_idx, _) in text.char_indices() {
        if seen == char_idx {
            return Some(byte_idx);
        }
        seen += 1;
    }
    if seen == char_idx {
        Some(text.len())
    } else {
        None
    }
}

/// Byte range covering `len` characters starting at character `start`
pub fn byte_range(text: &str, start: usize, len: usize) -> Option<Range<usize>> {
    let begin = byte_offset(text, start)?;
    let end = begin + byte_offset(&text[begin..], len)?;
    Some(begin..end)
}

/// Characters `[start, start + len)` of `text`
pub fn char_slice(text: &str, start: usize, len: usize) -> Option<&str> {
    byte_range(text, start, len).map(|range| &text[range])
}

/// Replace `len` characters at `start` with `replacement`
///
/// Returns `None` when the span runs past the end of `text`.
pub fn splice(text: &str, start: usize, len: usize, replacement: &str) -> Option<String> {
    let range = byte_range(text, start, len)?;
    let mut out = String::with_capacity(text.len() - range.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    Some(out)
}
