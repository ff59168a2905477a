//! Size-bounded text splitting shared by the chunkers.
//!
//! All sizes are counted in characters, never bytes, so splitting never
//! lands inside a multi-byte code point.

/// Separators tried from coarsest to finest when a unit is too large.
pub(crate) const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` into trimmed pieces of at most `max_chars` characters.
///
/// Segments produced by the first separator are packed greedily; a segment
/// that is still too large is split with the next separator, and as a last
/// resort by raw character count.
pub(crate) fn split_to_fit(text: &str, max_chars: usize, separators: &[&str]) -> Vec<String> {
    let mut pieces = Vec::new();
    pack(text, max_chars, separators, &mut pieces);
    pieces
}

fn pack(text: &str, max_chars: usize, separators: &[&str], out: &mut Vec<String>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    if char_len(trimmed) <= max_chars {
        out.push(trimmed.to_string());
        return;
    }
    let Some((separator, remaining)) = separators.split_first() else {
        split_by_chars(trimmed, max_chars, out);
        return;
    };

    let mut current = String::new();
    for segment in split_keeping_separator(trimmed, separator) {
        if current.is_empty() || char_len(&current) + char_len(segment) <= max_chars {
            current.push_str(segment);
        } else {
            pack(&current, max_chars, remaining, out);
            current = segment.to_string();
        }
    }
    pack(&current, max_chars, remaining, out);
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

fn split_by_chars(text: &str, max_chars: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    for window in chars.chunks(max_chars.max(1)) {
        let piece: String = window.iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
    }
}
