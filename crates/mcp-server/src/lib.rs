//! # Spillway MCP
//!
//! An MCP proxy that sits between a tool-calling client and an arbitrary
//! MCP server subprocess. Calls are forwarded verbatim; any response larger
//! than the client's budget is parked in a TTL-bounded on-disk cache and
//! replaced by a summary carrying a `resp_` id. Six management tools let
//! the client search the parked payload, page through it in chunks, and
//! manage the cache.
//!
//! ## Usage
//!
//! Add to your MCP client configuration, wrapping the real server command
//! after `--`:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "browser": {
//!       "command": "spillway-mcp",
//!       "args": ["--", "npx", "some-mcp-server"]
//!     }
//!   }
//! }
//! ```

pub mod config;
pub mod error;
pub mod limits;
pub mod proxy;
pub mod sweep;
pub mod transport;
