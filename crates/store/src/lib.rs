//! # Spillway Store
//!
//! TTL-bounded persistence for parked tool responses.
//!
//! Each cached response occupies two JSON records in the cache directory,
//! keyed by the same random id: `<id>.json` holds the raw payload and
//! `<id>.meta.json` its metadata projection. Records are written via
//! whole-file replace (temp file + rename), so a record is never partially
//! visible. Expiry is enforced lazily on read and proactively by the
//! periodic sweep the server runs.

mod error;
mod store;

pub use error::{Result, StoreError};
pub use store::{ResponseMetadata, ResponseStore, ID_PREFIX};
