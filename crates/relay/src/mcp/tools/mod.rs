pub mod delete_document;
pub mod get_backlinks;
pub mod get_links;
pub mod rename_document;

use crate::server::Server;
use serde_json::{json, Value};
use std::sync::Arc;

pub const TOOL_NAMES: [&str; 4] = [
    "get_backlinks",
    "get_links",
    "rename_document",
    "delete_document",
];

pub fn is_known(name: &str) -> bool {
    TOOL_NAMES.contains(&name)
}

/// Execute a tool by name. Unknown names are an error.
pub async fn call(server: &Arc<Server>, name: &str, arguments: &Value) -> Result<String, String> {
    match name {
        "get_backlinks" => get_backlinks::execute(server, arguments).await,
        "get_links" => get_links::execute(server, arguments).await,
        "rename_document" => rename_document::execute(server, arguments).await,
        "delete_document" => delete_document::execute(server, arguments).await,
        other => Err(format!("Unknown tool: {}", other)),
    }
}

/// Tool descriptors for `tools/list`.
pub fn definitions() -> Value {
    let document_id = json!({
        "type": "string",
        "description": "Identifier of the document"
    });
    json!([
        {
            "name": "get_backlinks",
            "description": "List documents that link to a document, and documents that mention its title without linking.",
            "inputSchema": {
                "type": "object",
                "properties": { "document_id": document_id },
                "required": ["document_id"]
            }
        },
        {
            "name": "get_links",
            "description": "List backlinks and forward links of a document.",
            "inputSchema": {
                "type": "object",
                "properties": { "document_id": document_id },
                "required": ["document_id"]
            }
        },
        {
            "name": "rename_document",
            "description": "Rename a document and update the title of every link pointing at it.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "document_id": document_id,
                    "new_title": { "type": "string", "description": "The new title" }
                },
                "required": ["document_id", "new_title"]
            }
        },
        {
            "name": "delete_document",
            "description": "Delete a document and turn every link pointing at it back into plain text.",
            "inputSchema": {
                "type": "object",
                "properties": { "document_id": document_id },
                "required": ["document_id"]
            }
        }
    ])
}

pub(crate) fn required_str<'a>(arguments: &'a Value, name: &str) -> Result<&'a str, String> {
    arguments
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Missing required parameter: {}", name))
}
