use serde::Serialize;
use serde_json::Value;

use spillway_protocol::{canonical_text, chunk_count};

use crate::error::{QueryError, Result};

/// One fixed-size slice of a payload's canonical rendering.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkResult {
    pub chunk: String,
    pub chunk_number: usize,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub has_more: bool,
}

/// Extracts chunk `chunk_number` of the canonical rendering.
///
/// Chunks are counted in characters; concatenating chunks `0..total_chunks`
/// reproduces the rendering exactly. An index at or past `total_chunks` is
/// a range error.
pub fn extract_chunk(value: &Value, chunk_number: usize, chunk_size: usize) -> Result<ChunkResult> {
    let rendered = canonical_text(value);
    let total_chunks = chunk_count(&rendered, chunk_size);
    if chunk_number >= total_chunks {
        return Err(QueryError::ChunkRange {
            requested: chunk_number,
            total: total_chunks,
        });
    }

    let chunk: String = rendered
        .chars()
        .skip(chunk_number * chunk_size)
        .take(chunk_size)
        .collect();

    Ok(ChunkResult {
        chunk,
        chunk_number,
        total_chunks,
        chunk_size,
        has_more: chunk_number + 1 < total_chunks,
    })
}
