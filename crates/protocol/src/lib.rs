//! # Spillway Protocol
//!
//! Shared wire-level building blocks for the Spillway proxy:
//!
//! - **JSON-RPC 2.0 envelopes** for the newline-delimited stream spoken to
//!   the wrapped server subprocess
//! - **Canonical text rendering** of structured payloads, the substrate the
//!   store sizes against and the query engine searches and chunks

pub mod jsonrpc;
pub mod render;

pub use jsonrpc::{
    Inbound, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION,
};
pub use render::{canonical_text, chunk_count};

/// MCP protocol revision sent during the `initialize` handshake.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
