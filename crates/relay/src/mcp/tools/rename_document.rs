use super::required_str;
use crate::server::Server;
use backlink_core::BacklinkError;
use serde_json::Value;
use std::sync::Arc;

/// Execute the `rename_document` tool: rename, retitle links in backlinkers, save.
pub async fn execute(server: &Arc<Server>, arguments: &Value) -> Result<String, String> {
    let document_id = required_str(arguments, "document_id")?;
    let new_title = required_str(arguments, "new_title")?;
    if new_title.trim().is_empty() {
        return Err("new_title must not be blank".to_string());
    }

    let outcome = server
        .backlinks()
        .rename_and_propagate(document_id, new_title)
        .await;

    // Completed per-document updates stick even when others failed
    if !matches!(outcome, Err(BacklinkError::NotFound(_))) {
        server.save().await.map_err(|e| format!("{:#}", e))?;
    }

    let report = outcome.map_err(|e| e.to_string())?;
    Ok(format!(
        "Renamed {} to \"{}\" ({} backlinked document(s) updated, {} skipped)",
        document_id, new_title, report.updated, report.skipped
    ))
}
