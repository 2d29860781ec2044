//! Routes incoming JSON-RPC messages to the handshake and the tools.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::session::AggregationSession;
use crate::tools::ToolRegistry;
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::validator::validate_request;

pub struct ProtocolHandler {
    session: Arc<AggregationSession>,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
}

impl ProtocolHandler {
    pub fn new(session: Arc<AggregationSession>) -> Self {
        Self {
            session,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
        }
    }

    pub fn session(&self) -> &Arc<AggregationSession> {
        &self.session
    }

    /// Handle one message; `None` means nothing is written back.
    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("Received unexpected message type from client");
                None
            }
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return e.to_json_rpc_error(request.id).into_value();
        }

        let id = request.id.clone();
        match self.dispatch_request(&request).await {
            Ok(value) => JsonRpcResponse::new(id, value).into_value(),
            Err(e) => {
                tracing::debug!(method = %request.method, %id, "Request failed: {e}");
                e.to_json_rpc_error(id).into_value()
            }
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,
            "shutdown" => self.handle_shutdown().await,

            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params.clone()).await,

            "ping" => Ok(empty_object()),

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                self.capabilities.lock().await.mark_initialized();
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                // Calls run to completion; cancellation is only logged.
                match notification
                    .params
                    .map(serde_json::from_value::<CancelRequestParams>)
                {
                    Some(Ok(params)) => tracing::info!(
                        "Client cancelled request {} ({})",
                        params.request_id,
                        params.reason.as_deref().unwrap_or("no reason given")
                    ),
                    _ => tracing::info!("Received cancellation notification"),
                }
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = required_params(params, "Initialize")?;

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params)?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_shutdown(&self) -> McpResult<Value> {
        tracing::info!(
            "Shutdown requested by {}",
            self.capabilities.lock().await.client_name()
        );
        self.session.close().await?;
        Ok(empty_object())
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        let result = ToolListResult {
            tools: ToolRegistry::list_tools(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = required_params(params, "Tool call")?;

        {
            let caps = self.capabilities.lock().await;
            if !caps.is_ready() {
                tracing::warn!(
                    "Tool '{}' called by {} before the handshake completed",
                    call_params.name,
                    caps.client_name()
                );
            }
        }

        let result =
            ToolRegistry::call(&call_params.name, call_params.arguments, &self.session).await?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

fn required_params<T: DeserializeOwned>(params: Option<Value>, what: &str) -> McpResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams(format!("{what} params required")))
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
