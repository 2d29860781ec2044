//! Stdio transport: JSON-RPC lines in on stdin, responses out on stdout.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::ProtocolHandler;
use crate::types::{McpError, McpResult, RequestId};

use super::framing;

pub struct StdioTransport {
    handler: ProtocolHandler,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }

    /// Serve until stdin closes, then release the store connection.
    pub async fn run(&self) -> McpResult<()> {
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut line = String::new();

        tracing::info!("Stdio transport started");

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match framing::parse_message(trimmed) {
                Ok(msg) => self.handler.handle_message(msg).await,
                Err(e) => {
                    tracing::warn!("Parse error: {e}");
                    Some(e.to_json_rpc_error(RequestId::Null).into_value())
                }
            };

            if let Some(response) = response {
                write_line(&mut stdout, &response).await?;
            }
        }

        match self.handler.session().close().await {
            // A client that sent `shutdown` has already closed it.
            Ok(()) | Err(McpError::SessionClosed) => {}
            Err(e) => tracing::warn!("Failed to release the store connection: {e}"),
        }
        Ok(())
    }
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, value: &serde_json::Value) -> McpResult<()> {
    let framed = framing::frame_message(value)?;
    out.write_all(framed.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
