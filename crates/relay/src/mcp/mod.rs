pub mod jsonrpc;
pub mod router;
pub mod tools;

use crate::server::Server;
use anyhow::Result;
use jsonrpc::{error_response, JsonRpcMessage, JsonRpcResponse, PARSE_ERROR};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

pub use router::{dispatch_request, handle_notification};

/// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes.
pub async fn serve_stdio(server: Arc<Server>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(server, stdin, stdout).await
}

pub async fn serve<R, W>(server: Arc<Server>, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("Serving JSON-RPC on stdio");
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(&server, line).await,
            Err(e) => {
                tracing::warn!("Message is not valid UTF-8: {}", e);
                Some(error_response(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };
        let Some(response) = response else {
            continue;
        };
        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
    }
    tracing::info!("stdin closed, shutting down");
    Ok(())
}

async fn handle_line(server: &Arc<Server>, line: &str) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<JsonRpcMessage>(line) {
        Ok(JsonRpcMessage::Request(request)) => Some(dispatch_request(server, &request).await),
        Ok(JsonRpcMessage::Notification(notification)) => {
            handle_notification(&notification);
            None
        }
        Err(e) => {
            tracing::warn!("Unparseable message: {}", e);
            Some(error_response(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", e),
            ))
        }
    }
}
