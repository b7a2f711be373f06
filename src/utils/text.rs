//! Length accounting for outbound text.
//!
//! Telegram measures message length in UTF-16 code units, so every cap in
//! this crate is expressed in those units and every cut lands on a `char`
//! boundary.

pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Largest byte index whose prefix fits in `max_units` UTF-16 code units.
pub fn floor_boundary(text: &str, max_units: usize) -> usize {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return index;
        }
    }
    text.len()
}

/// Splits `text` into the prefix that fits in `max_units` and the rest.
pub fn truncate_units(text: &str, max_units: usize) -> (&str, &str) {
    text.split_at(floor_boundary(text, max_units))
}

/// Byte index at which an over-long text is cut.
///
/// The cut lands on the first newline at or after the cap, so a piece runs
/// to the end of the line the cap falls in. The newline stays at the head of
/// the remainder, which keeps the pieces concatenating back to the input.
/// Without a newline past the cap the cut is a hard one at the cap.
pub fn split_point(text: &str, max_units: usize) -> usize {
    let boundary = floor_boundary(text, max_units);
    if boundary == 0 {
        // cap smaller than the first char; still make progress
        return text.chars().next().map(char::len_utf8).unwrap_or(0);
    }

    match text[boundary..].find('\n') {
        Some(offset) => boundary + offset,
        None => boundary,
    }
}
