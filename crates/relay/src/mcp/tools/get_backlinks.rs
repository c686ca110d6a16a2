use super::required_str;
use crate::server::Server;
use backlink_core::Backlink;
use serde_json::Value;
use std::sync::Arc;

/// Execute the `get_backlinks` tool: linked and unlinked backlinks with context.
pub async fn execute(server: &Arc<Server>, arguments: &Value) -> Result<String, String> {
    let document_id = required_str(arguments, "document_id")?;

    let backlinks = server
        .backlinks()
        .get_backlinks(document_id)
        .await
        .map_err(|e| e.to_string())?;

    let heading = match server.title_of(document_id) {
        Some(title) => format!("{} ({})", title, document_id),
        None => document_id.to_string(),
    };

    let mut output = String::new();
    output.push_str(&format!("Linked backlinks to {}:\n", heading));
    push_backlinks(&mut output, &backlinks.linked);
    output.push_str("\nUnlinked mentions:\n");
    push_backlinks(&mut output, &backlinks.unlinked);
    Ok(output)
}

fn push_backlinks(output: &mut String, backlinks: &[Backlink]) {
    if backlinks.is_empty() {
        output.push_str("- (none)\n");
        return;
    }
    for backlink in backlinks {
        output.push_str(&format!("- {} ({})\n", backlink.title, backlink.document_id));
        for found in &backlink.matches {
            output.push_str(&format!("    > {}\n", found.context));
        }
    }
}
