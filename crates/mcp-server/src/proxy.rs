//! Client-facing MCP server: session lifecycle, tool catalog merging, call
//! routing, and the response size gate.
//!
//! Management calls are handled locally against the store and query engine;
//! every other call forwards verbatim to the wrapped server. A forwarded
//! response larger than the client budget is parked in the store and
//! replaced by a summary carrying its cache id.

use std::sync::{Arc, RwLock};

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, InitializeRequestParams,
    InitializeResult, ListToolsResult, PaginatedRequestParams, ProtocolVersion,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use spillway_protocol::MCP_PROTOCOL_VERSION;
use spillway_store::{ResponseMetadata, ResponseStore};

use crate::config::GateConfig;
use crate::error::TransportError;
use crate::transport::RpcClient;

mod catalog;
mod manage;

pub use catalog::{management_tools, MANAGEMENT_TOOL_NAMES};

/// Identity the wrapped server declared during the startup handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Performs the strict startup handshake with the wrapped server:
/// `initialize`, capture its identity, then `notifications/initialized`.
/// No other request is sent before this completes.
pub async fn perform_handshake(transport: &RpcClient) -> Result<RemoteServerInfo, TransportError> {
    let result = transport
        .request(
            "initialize",
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "spillway-mcp",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
        .await?;

    let remote = result
        .get("serverInfo")
        .and_then(|info| serde_json::from_value(info.clone()).ok())
        .unwrap_or_default();

    transport.notify("notifications/initialized", None).await?;
    Ok(remote)
}

/// The proxy's MCP service.
#[derive(Clone)]
pub struct SpillwayServer {
    /// Current immutable configuration; replaced wholesale when the client
    /// identity becomes known.
    config: Arc<RwLock<Arc<GateConfig>>>,
    transport: Arc<RpcClient>,
    store: Arc<ResponseStore>,
    remote: RemoteServerInfo,
    /// Remote catalog, fetched once on first listing and never refreshed.
    remote_tools: Arc<OnceCell<Vec<Tool>>>,
}

impl SpillwayServer {
    pub fn new(
        config: GateConfig,
        transport: Arc<RpcClient>,
        store: Arc<ResponseStore>,
        remote: RemoteServerInfo,
    ) -> Self {
        transport.on_notification(|notification| {
            log::debug!("notification from wrapped server: {}", notification.method);
        });
        Self {
            config: Arc::new(RwLock::new(Arc::new(config))),
            transport,
            store,
            remote,
            remote_tools: Arc::new(OnceCell::new()),
        }
    }

    pub(crate) fn config(&self) -> Arc<GateConfig> {
        self.config
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn replace_config(&self, config: GateConfig) {
        let updated = Arc::new(config);
        match self.config.write() {
            Ok(mut guard) => *guard = updated,
            Err(poisoned) => *poisoned.into_inner() = updated,
        }
    }

    pub(crate) fn store(&self) -> &ResponseStore {
        &self.store
    }

    async fn remote_tools(&self) -> &[Tool] {
        self.remote_tools
            .get_or_init(|| self.fetch_remote_tools())
            .await
    }

    /// One-shot fetch of the wrapped server's catalog. Any failure degrades
    /// to an empty remote set; listing still succeeds with the management
    /// tools alone.
    async fn fetch_remote_tools(&self) -> Vec<Tool> {
        let result = match self.transport.request("tools/list", json!({})).await {
            Ok(result) => result,
            Err(err) => {
                log::warn!(
                    "tools/list against the wrapped server failed: {err}; serving management tools only"
                );
                return Vec::new();
            }
        };

        let Some(items) = result.get("tools").and_then(Value::as_array) else {
            log::warn!("wrapped server returned no tools array; serving management tools only");
            return Vec::new();
        };

        let mut tools = Vec::with_capacity(items.len());
        for item in items {
            match Tool::deserialize(item) {
                Ok(tool) => tools.push(tool),
                Err(err) => log::warn!("skipping remote tool with an unreadable descriptor: {err}"),
            }
        }
        tools
    }

    /// Pass-through path: forward the call, then apply the size gate to the
    /// reply. Never returns a protocol error; failures render as
    /// error-flagged text naming the tool.
    async fn forward_call(
        &self,
        name: &str,
        arguments: Option<rmcp::model::JsonObject>,
    ) -> CallToolResult {
        let config = self.config();
        let params = json!({
            "name": name,
            "arguments": Value::Object(arguments.unwrap_or_default()),
        });

        let result = match self.transport.request("tools/call", params).await {
            Ok(result) => result,
            Err(TransportError::Remote(message)) if is_size_violation(&message) => {
                return CallToolResult::error(vec![Content::text(SIZE_LIMIT_GUIDANCE)]);
            }
            Err(err) => {
                return CallToolResult::error(vec![Content::text(format!(
                    "Tool '{name}' failed: {err}"
                ))]);
            }
        };

        // Serializing a Value cannot fail; if it ever did, the gate fails
        // closed rather than passing an unmeasured payload through.
        let measured = serde_json::to_vec(&result).map_or(usize::MAX, |bytes| bytes.len());
        if measured <= config.max_response_bytes() {
            return match CallToolResult::deserialize(&result) {
                Ok(reply) => reply,
                Err(err) => {
                    log::debug!(
                        "result of '{name}' is not a standard tool reply ({err}); forwarding as text"
                    );
                    let text = serde_json::to_string(&result).unwrap_or_default();
                    CallToolResult::success(vec![Content::text(text)])
                }
            };
        }

        match self.store.save(name, &result, &config.client_label).await {
            Ok(metadata) => CallToolResult::success(vec![Content::text(parked_summary(
                &metadata,
                config.chunk_size,
            ))]),
            Err(err) => CallToolResult::error(vec![Content::text(format!(
                "Tool '{name}' failed: response of {measured} bytes exceeded the {} byte budget and could not be cached: {err}",
                config.max_response_bytes(),
            ))]),
        }
    }
}

impl ServerHandler for SpillwayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "spillway-mcp".to_string(),
                title: Some("Spillway".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Spillway proxies the '{}' MCP server and parks any tool response larger than \
                 the client budget in a TTL-bounded cache. An oversized call returns a \
                 response_id instead of the payload; use query_response to search it (plain \
                 text, /regex/, or $.jsonpath), get_chunk to page through it, and \
                 list_responses/get_response_info/refresh_response/delete_response to manage \
                 the cache.",
                self.remote.name,
            )),
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn initialize(
        &self,
        request: InitializeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<InitializeResult, McpError>> + Send + '_ {
        async move {
            let client_name = request.client_info.name.clone();
            let updated = self.config().for_client(&client_name);
            log::info!(
                "client '{client_name}' connected; direct-response budget is {} bytes",
                updated.max_response_bytes()
            );
            self.replace_config(updated);

            // Echo the client's protocol revision so strict clients keep
            // the transport open.
            let mut info = self.get_info();
            info.protocol_version = request.protocol_version;
            Ok(info)
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let mut tools = catalog::management_tools();
        tools.extend(self.remote_tools().await.iter().cloned());
        Ok(ListToolsResult::with_all_items(tools))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        catalog::management_tools()
            .into_iter()
            .find(|tool| tool.name == name)
            .or_else(|| {
                self.remote_tools
                    .get()
                    .and_then(|tools| tools.iter().find(|tool| tool.name == name).cloned())
            })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if catalog::is_management_tool(&request.name) {
            let reply = match manage::dispatch(self, &request.name, request.arguments).await {
                Ok(text) => text,
                // Management calls never fail the session; errors render as
                // plain text.
                Err(err) => format!("Error: {err:#}"),
            };
            return Ok(CallToolResult::success(vec![Content::text(reply)]));
        }
        Ok(self.forward_call(&request.name, request.arguments).await)
    }
}

const SIZE_LIMIT_GUIDANCE: &str = "The wrapped server refused this call because the reply would \
exceed its own size limit. Ask for less data (add a filter, reduce the page size, or request a \
narrower range) and try again. Replies that fit are returned directly; anything larger is parked \
automatically and reachable through query_response and get_chunk.";

/// Substring heuristic for size-violation errors surfaced by the remote
/// protocol layer.
fn is_size_violation(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("exceeds maximum")
        || message.contains("too large")
        || message.contains("token limit")
}

fn parked_summary(metadata: &ResponseMetadata, chunk_size: usize) -> String {
    let size_kib = metadata.size_bytes as f64 / 1024.0;
    serde_json::to_string_pretty(&json!({
        "status": "cached",
        "response_id": metadata.id,
        "tool_name": metadata.tool_name,
        "size_kib": (size_kib * 10.0).round() / 10.0,
        "chunk_count": metadata.chunk_count,
        "expires_at": metadata.expires_at.to_rfc3339(),
        "message": format!(
            "The response from '{}' was larger than the client budget and has been parked instead of returned.",
            metadata.tool_name,
        ),
        "next_steps": [
            format!(
                "query_response(response_id: \"{}\", query: ...) searches it; plain text, /regex/, and $.jsonpath queries are supported.",
                metadata.id,
            ),
            format!(
                "get_chunk(response_id: \"{}\", chunk_number: 0) reads it sequentially in chunks of {chunk_size} characters.",
                metadata.id,
            ),
        ],
    }))
    .unwrap_or_default()
}
