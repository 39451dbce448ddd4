//! JSON-RPC 2.0 envelope types for the newline-delimited subprocess stream.
//!
//! Requests carry a numeric id; notifications omit it. Inbound traffic is
//! classified purely by the presence of an `id` field, matching how the
//! stream is dispatched: responses resolve a pending request, everything
//! else fans out to notification listeners.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request. The id is allocated by the transport and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Outbound or inbound notification: same framing as a request, no id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Error object attached to a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound response, correlated back to a pending request by id.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// One parsed line of inbound traffic.
#[derive(Debug, Clone)]
pub enum Inbound {
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

/// Parses one newline-framed message and classifies it by id presence.
///
/// A message with a non-numeric id is an error: the transport only ever
/// allocates integer ids, so nothing else can correlate.
pub fn parse_inbound(line: &str) -> Result<Inbound, serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    if value.get("id").is_some_and(|id| !id.is_null()) {
        serde_json::from_value(value).map(Inbound::Response)
    } else {
        serde_json::from_value(value).map(Inbound::Notification)
    }
}
