use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::jsonrpc::{
    error_response, success_response, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use super::tools;
use crate::server::Server;

const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Dispatch a JSON-RPC request to the appropriate handler.
pub async fn dispatch_request(server: &Arc<Server>, request: &JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return error_response(id, INVALID_REQUEST, "Unsupported jsonrpc version");
    }
    match request.method.as_str() {
        "initialize" => handle_initialize(id, request.params.as_ref()),
        "ping" => handle_ping(id),
        "tools/list" => handle_tools_list(id),
        "tools/call" => handle_tools_call(server, id, request.params.as_ref()).await,
        other => error_response(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    }
}

/// Handle a JSON-RPC notification (no response expected).
pub fn handle_notification(notification: &JsonRpcNotification) {
    if notification.jsonrpc != "2.0" {
        debug!("Ignoring notification with jsonrpc {}", notification.jsonrpc);
        return;
    }
    match &notification.params {
        Some(params) => debug!("Notification: {} {}", notification.method, params),
        None => debug!("Notification: {}", notification.method),
    }
}

fn handle_initialize(id: Value, params: Option<&Value>) -> JsonRpcResponse {
    let protocol_version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);

    if let Some(client) = params.and_then(|p| p.get("clientInfo")) {
        debug!("Initialize from client {}", client);
    }

    success_response(
        id,
        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "relay",
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}

fn handle_ping(id: Value) -> JsonRpcResponse {
    success_response(id, json!({}))
}

fn handle_tools_list(id: Value) -> JsonRpcResponse {
    success_response(id, json!({ "tools": tools::definitions() }))
}

async fn handle_tools_call(
    server: &Arc<Server>,
    id: Value,
    params: Option<&Value>,
) -> JsonRpcResponse {
    let Some(name) = params.and_then(|p| p.get("name")).and_then(|v| v.as_str()) else {
        return error_response(id, INVALID_PARAMS, "Missing tool name");
    };
    if !tools::is_known(name) {
        return error_response(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
    }

    let empty = json!({});
    let arguments = params.and_then(|p| p.get("arguments")).unwrap_or(&empty);

    debug!("Tool call: {}", name);
    let (text, is_error) = match tools::call(server, name, arguments).await {
        Ok(text) => (text, false),
        Err(message) => (message, true),
    };

    success_response(
        id,
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error
        }),
    )
}
