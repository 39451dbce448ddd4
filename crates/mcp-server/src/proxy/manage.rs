//! Handlers for the six management tools.
//!
//! Every handler produces text for the client; the dispatcher's caller
//! turns any error into a plain "Error: ..." reply, so a management call
//! can never fail the session.

use anyhow::{bail, Context, Result};
use rmcp::model::JsonObject;
use serde::Deserialize;
use serde_json::{json, Value};

use spillway_query::{extract_chunk, query, QueryMode, QueryOptions};

use super::SpillwayServer;

pub(super) async fn dispatch(
    server: &SpillwayServer,
    name: &str,
    arguments: Option<JsonObject>,
) -> Result<String> {
    match name {
        "query_response" => query_response(server, parse_args(name, arguments)?).await,
        "get_chunk" => get_chunk(server, parse_args(name, arguments)?).await,
        "list_responses" => list_responses(server).await,
        "get_response_info" => get_response_info(server, parse_args(name, arguments)?).await,
        "refresh_response" => refresh_response(server, parse_args(name, arguments)?).await,
        "delete_response" => delete_response(server, parse_args(name, arguments)?).await,
        other => bail!("unknown management tool '{other}'"),
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: Option<JsonObject>) -> Result<T> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
        .with_context(|| format!("invalid arguments for {tool}"))
}

async fn load_payload(server: &SpillwayServer, id: &str) -> Result<Value> {
    server
        .store()
        .get(id)
        .await?
        .with_context(|| format!("response '{id}' not found or expired"))
}

#[derive(Debug, Deserialize)]
struct QueryResponseArgs {
    response_id: String,
    query: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn query_response(server: &SpillwayServer, args: QueryResponseArgs) -> Result<String> {
    let value = load_payload(server, &args.response_id).await?;

    let mut options = QueryOptions::default();
    if let Some(mode) = args.mode.as_deref() {
        options.mode = Some(QueryMode::parse(mode).with_context(|| {
            format!("unknown query mode '{mode}' (expected text, regex, or jsonpath)")
        })?);
    }
    if let Some(limit) = args.limit {
        options.limit = limit;
    }

    let page = query(&value, &args.query, &options)?;
    Ok(serde_json::to_string_pretty(&page)?)
}

#[derive(Debug, Deserialize)]
struct GetChunkArgs {
    response_id: String,
    chunk_number: usize,
}

async fn get_chunk(server: &SpillwayServer, args: GetChunkArgs) -> Result<String> {
    let value = load_payload(server, &args.response_id).await?;
    let chunk = extract_chunk(&value, args.chunk_number, server.store().chunk_size())?;
    Ok(serde_json::to_string_pretty(&chunk)?)
}

async fn list_responses(server: &SpillwayServer) -> Result<String> {
    let responses = server.store().list().await?;
    Ok(serde_json::to_string_pretty(&json!({
        "count": responses.len(),
        "responses": responses,
    }))?)
}

#[derive(Debug, Deserialize)]
struct ResponseIdArgs {
    response_id: String,
}

async fn get_response_info(server: &SpillwayServer, args: ResponseIdArgs) -> Result<String> {
    let metadata = server
        .store()
        .get_metadata(&args.response_id)
        .await?
        .with_context(|| format!("response '{}' not found or expired", args.response_id))?;
    Ok(serde_json::to_string_pretty(&metadata)?)
}

async fn refresh_response(server: &SpillwayServer, args: ResponseIdArgs) -> Result<String> {
    if !server.store().refresh(&args.response_id).await? {
        bail!("response '{}' not found or expired", args.response_id);
    }
    let metadata = server
        .store()
        .get_metadata(&args.response_id)
        .await?
        .with_context(|| format!("response '{}' not found or expired", args.response_id))?;
    Ok(serde_json::to_string_pretty(&json!({
        "response_id": args.response_id,
        "refreshed": true,
        "expires_at": metadata.expires_at.to_rfc3339(),
    }))?)
}

async fn delete_response(server: &SpillwayServer, args: ResponseIdArgs) -> Result<String> {
    if !server.store().delete(&args.response_id).await? {
        bail!("response '{}' not found or expired", args.response_id);
    }
    Ok(serde_json::to_string_pretty(&json!({
        "response_id": args.response_id,
        "deleted": true,
    }))?)
}
