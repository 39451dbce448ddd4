//! Canonical text rendering of cached payloads.
//!
//! The rendering is the single substrate everything downstream agrees on:
//! the store derives `size_bytes` and `chunk_count` from it at save time,
//! and the query engine searches and slices the exact same text, so chunk
//! concatenation reproduces the rendering byte for byte.

use serde_json::Value;

/// Renders a structured value to its deterministic indented textual form.
///
/// A bare string renders as its raw contents so that text and regex search
/// over a large text payload is not distorted by JSON escaping; everything
/// else is pretty-printed JSON with two-space indentation.
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Number of fixed-size chunks the rendering splits into.
///
/// Counted in characters, matching chunk extraction; an empty rendering has
/// zero chunks.
pub fn chunk_count(text: &str, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    text.chars().count().div_ceil(chunk_size)
}
