//! Minimal newline-framed MCP server used as the wrapped-server fixture in
//! integration tests.
//!
//! Speaks just enough of the protocol to exercise the proxy: `initialize`,
//! `tools/list`, a `generate` tool producing payloads of any requested
//! size, a `fail` tool echoing a protocol-level error, and a handful of
//! `debug/*` methods for transport edge cases (unanswered requests, abrupt
//! exit, garbage lines, notifications).

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

fn main() {
    let stdin = io::stdin();
    let stdout = io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(message) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let method = message.get("method").and_then(Value::as_str).unwrap_or_default();
        let id = message.get("id").cloned();

        match method {
            "initialize" => respond(
                &stdout,
                id,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "spillway-mock-target",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "notifications/initialized" => {}
            "tools/list" => respond(
                &stdout,
                id,
                json!({
                    "tools": [
                        {
                            "name": "generate",
                            "description": "Produce a text payload of the requested size.",
                            "inputSchema": {
                                "type": "object",
                                "properties": {
                                    "size": {"type": "integer", "minimum": 0},
                                    "fill": {"type": "string"}
                                },
                                "required": ["size"]
                            }
                        },
                        {
                            "name": "fail",
                            "description": "Reply with a protocol-level error.",
                            "inputSchema": {
                                "type": "object",
                                "properties": {
                                    "message": {"type": "string"}
                                },
                                "required": ["message"]
                            }
                        }
                    ]
                }),
            ),
            "tools/call" => handle_call(&stdout, id, message.get("params")),
            // Never answered: lets tests exercise the request timeout.
            "debug/black_hole" => {}
            "debug/exit" => std::process::exit(0),
            "debug/garbage" => {
                {
                    let mut out = stdout.lock();
                    let _ = writeln!(out, "this line is not json");
                    let _ = out.flush();
                }
                respond(&stdout, id, json!({"ok": true}));
            }
            "debug/emit_notification" => {
                notify(
                    &stdout,
                    "notifications/message",
                    json!({"level": "info", "data": "hello from the mock"}),
                );
                respond(&stdout, id, json!({"ok": true}));
            }
            _ => {
                if id.is_some() {
                    respond_error(&stdout, id, -32601, &format!("Method not found: {method}"));
                }
            }
        }
    }
}

fn handle_call(stdout: &io::Stdout, id: Option<Value>, params: Option<&Value>) {
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    match name {
        "generate" => {
            let size = arguments.get("size").and_then(Value::as_u64).unwrap_or(0) as usize;
            let fill = arguments
                .get("fill")
                .and_then(Value::as_str)
                .filter(|fill| !fill.is_empty())
                .unwrap_or("x");
            let text: String = fill.chars().cycle().take(size).collect();
            respond(
                stdout,
                id,
                json!({"content": [{"type": "text", "text": text}]}),
            );
        }
        "fail" => {
            let message = arguments
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("failure requested");
            respond_error(stdout, id, -32000, message);
        }
        other => respond_error(stdout, id, -32602, &format!("Unknown tool: {other}")),
    }
}

fn respond(stdout: &io::Stdout, id: Option<Value>, result: Value) {
    let Some(id) = id else { return };
    write_line(stdout, &json!({"jsonrpc": "2.0", "id": id, "result": result}));
}

fn respond_error(stdout: &io::Stdout, id: Option<Value>, code: i64, message: &str) {
    let Some(id) = id else { return };
    write_line(
        stdout,
        &json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}),
    );
}

fn notify(stdout: &io::Stdout, method: &str, params: Value) {
    write_line(stdout, &json!({"jsonrpc": "2.0", "method": method, "params": params}));
}

fn write_line(stdout: &io::Stdout, message: &Value) {
    let mut out = stdout.lock();
    let _ = writeln!(out, "{message}");
    let _ = out.flush();
}
