//! The fixed management tool surface.
//!
//! These six descriptors are the client-visible contract for operating on
//! parked responses; everything else in the merged catalog comes from the
//! wrapped server.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{Tool, ToolAnnotations};
use serde_json::{json, Map, Value};

pub const MANAGEMENT_TOOL_NAMES: [&str; 6] = [
    "query_response",
    "get_chunk",
    "list_responses",
    "get_response_info",
    "refresh_response",
    "delete_response",
];

pub(crate) fn is_management_tool(name: &str) -> bool {
    MANAGEMENT_TOOL_NAMES.contains(&name)
}

pub fn management_tools() -> Vec<Tool> {
    vec![
        descriptor(
            "query_response",
            "Search a cached response by plain text, /regex/ literal, or $.jsonpath expression. \
             Returns matching lines with surrounding context (or matching values for jsonpath), \
             paginated.",
            json!({
                "type": "object",
                "properties": {
                    "response_id": {
                        "type": "string",
                        "description": "Id of the cached response (resp_ prefix)"
                    },
                    "query": {
                        "type": "string",
                        "description": "Plain text, /regex/ literal, or $.jsonpath expression; the mode is auto-detected"
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["text", "regex", "jsonpath"],
                        "description": "Force a query mode instead of auto-detection"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum matches to return (default 100)"
                    }
                },
                "required": ["response_id", "query"]
            }),
            true,
        ),
        descriptor(
            "get_chunk",
            "Read one fixed-size chunk of a cached response. Chunks are numbered from 0; the \
             reply reports the total and whether more remain.",
            json!({
                "type": "object",
                "properties": {
                    "response_id": {
                        "type": "string",
                        "description": "Id of the cached response (resp_ prefix)"
                    },
                    "chunk_number": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "0-based chunk index"
                    }
                },
                "required": ["response_id", "chunk_number"]
            }),
            true,
        ),
        descriptor(
            "list_responses",
            "List metadata for every cached response: id, originating tool, size, chunk count, \
             and expiry.",
            json!({
                "type": "object",
                "properties": {}
            }),
            true,
        ),
        descriptor(
            "get_response_info",
            "Metadata for one cached response, without touching its payload or expiry.",
            json!({
                "type": "object",
                "properties": {
                    "response_id": {
                        "type": "string",
                        "description": "Id of the cached response (resp_ prefix)"
                    }
                },
                "required": ["response_id"]
            }),
            true,
        ),
        descriptor(
            "refresh_response",
            "Extend a cached response's expiry by a full TTL from now.",
            json!({
                "type": "object",
                "properties": {
                    "response_id": {
                        "type": "string",
                        "description": "Id of the cached response (resp_ prefix)"
                    }
                },
                "required": ["response_id"]
            }),
            false,
        ),
        descriptor(
            "delete_response",
            "Delete a cached response and its metadata immediately.",
            json!({
                "type": "object",
                "properties": {
                    "response_id": {
                        "type": "string",
                        "description": "Id of the cached response (resp_ prefix)"
                    }
                },
                "required": ["response_id"]
            }),
            false,
        ),
    ]
}

fn descriptor(name: &'static str, description: &'static str, schema: Value, read_only: bool) -> Tool {
    let input_schema = match schema {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(Map::new()),
    };
    Tool {
        name: Cow::Borrowed(name),
        title: None,
        description: Some(Cow::Borrowed(description)),
        input_schema,
        output_schema: None,
        annotations: read_only.then(|| ToolAnnotations::new().read_only(true)),
        execution: None,
        icons: None,
        meta: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn catalog_matches_the_fixed_contract() {
        let tools = management_tools();
        let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_ref()).collect();
        assert_eq!(names, MANAGEMENT_TOOL_NAMES.to_vec());
        assert!(names.iter().all(|name| is_management_tool(name)));
        assert!(!is_management_tool("generate"));
    }

    #[test]
    fn required_arguments_match_the_contract() {
        let required_of = |name: &str| -> Vec<String> {
            management_tools()
                .into_iter()
                .find(|tool| tool.name == name)
                .expect("tool exists")
                .input_schema
                .get("required")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        assert_eq!(required_of("query_response"), vec!["response_id", "query"]);
        assert_eq!(required_of("get_chunk"), vec!["response_id", "chunk_number"]);
        assert_eq!(required_of("list_responses"), Vec::<String>::new());
        assert_eq!(required_of("get_response_info"), vec!["response_id"]);
        assert_eq!(required_of("refresh_response"), vec!["response_id"]);
        assert_eq!(required_of("delete_response"), vec!["response_id"]);
    }
}
