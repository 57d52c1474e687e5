//! Canonical whitespace handling for extracted document text.

use itertools::Itertools;

/// Collapse every run of whitespace into a single space and trim both ends.
///
/// Whitespace-only input becomes the empty string. The result is a fixed
/// point: normalizing it again returns it unchanged.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().join(" ")
}

/// Whether `text` has no content once normalized.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
