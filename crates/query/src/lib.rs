//! # Spillway Query
//!
//! Stateless extraction of sub-views from a cached payload. Every entry
//! point is a pure function of `(value, query, options)`:
//!
//! - **Text mode**: case-insensitive substring search, line by line, over
//!   the canonical text rendering
//! - **Regex mode**: `/pattern/flags` literals or raw patterns, global and
//!   case-insensitive by default
//! - **Path mode**: a JSONPath-style subset evaluated against the
//!   structured value itself, never its serialization
//! - **Chunking**: fixed-size character slices of the canonical rendering,
//!   concatenating back to the full rendering exactly

mod chunk;
mod engine;
mod error;
mod path;

pub use chunk::{extract_chunk, ChunkResult};
pub use engine::{detect_mode, query, LineMatch, QueryMode, QueryOptions, QueryResults};
pub use error::{QueryError, Result};
