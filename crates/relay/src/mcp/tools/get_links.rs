use super::required_str;
use crate::server::Server;
use serde_json::Value;
use std::sync::Arc;

/// Execute the `get_links` tool: return backlinks and forward links for a document.
pub async fn execute(server: &Arc<Server>, arguments: &Value) -> Result<String, String> {
    let document_id = required_str(arguments, "document_id")?;
    let service = server.backlinks();

    // Forward links first: they fail for an unknown document
    let forward = service
        .forward_links(document_id)
        .await
        .map_err(|e| format!("Error: {}", e))?;
    let backlinks = service
        .get_backlinks(document_id)
        .await
        .map_err(|e| format!("Error: {}", e))?;

    let mut output = String::new();
    output.push_str("Backlinks (documents linking to this):\n");
    if backlinks.linked.is_empty() {
        output.push_str("- (none)\n");
    } else {
        for backlink in &backlinks.linked {
            output.push_str(&format!("- {} ({})\n", backlink.title, backlink.document_id));
        }
    }

    output.push_str("\nForward links (documents this links to):\n");
    if forward.is_empty() {
        output.push_str("- (none)\n");
    } else {
        for link in &forward {
            match &link.title {
                Some(title) => output.push_str(&format!("- {} ({})\n", title, link.target_id)),
                None => output.push_str(&format!("- {} (missing)\n", link.target_id)),
            }
        }
    }

    Ok(output)
}
