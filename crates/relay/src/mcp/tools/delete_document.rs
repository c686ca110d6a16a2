use super::required_str;
use crate::server::Server;
use backlink_core::BacklinkError;
use serde_json::Value;
use std::sync::Arc;

/// Execute the `delete_document` tool: delete, unwrap links in backlinkers, save.
pub async fn execute(server: &Arc<Server>, arguments: &Value) -> Result<String, String> {
    let document_id = required_str(arguments, "document_id")?;

    let outcome = server.backlinks().delete_and_propagate(document_id).await;

    if !matches!(outcome, Err(BacklinkError::NotFound(_))) {
        server.save().await.map_err(|e| format!("{:#}", e))?;
    }

    let report = outcome.map_err(|e| e.to_string())?;
    Ok(format!(
        "Deleted {} ({} backlinked document(s) unlinked, {} skipped)",
        document_id, report.updated, report.skipped
    ))
}
