//! JSON-RPC 2.0 envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::error_codes::INTERNAL_ERROR;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request id: string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub id: RequestId,
    pub error: JsonRpcErrorObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A message with no id; never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Any inbound line. Variant order matters for untagged matching:
/// a request carries an id, a notification does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
    Notification(JsonRpcNotification),
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(&self)
            .unwrap_or_else(|e| unserializable("response", &self.id, &e))
    }
}

impl JsonRpcError {
    pub fn into_value(self) -> Value {
        serde_json::to_value(&self)
            .unwrap_or_else(|e| unserializable("error response", &self.id, &e))
    }
}

/// Internal-error envelope for a message that failed to serialize; built
/// without serde so it cannot fail in turn.
fn unserializable(what: &str, id: &RequestId, e: &serde_json::Error) -> Value {
    tracing::warn!("Failed to serialize {what} for request {id}: {e}");
    let id = match id {
        RequestId::String(s) => Value::String(s.clone()),
        RequestId::Number(n) => Value::from(*n),
        RequestId::Null => Value::Null,
    };
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": INTERNAL_ERROR,
            "message": format!("Internal error: failed to serialize {what}: {e}")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    #[test]
    fn test_response_into_value() {
        let value = JsonRpcResponse::new(RequestId::Number(3), serde_json::json!({"ok": true}))
            .into_value();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 3);
        assert_eq!(value["result"]["ok"], true);
    }

    #[test]
    fn test_unserializable_becomes_internal_error() {
        let e = serde_json::Error::custom("key must be a string");
        let value = unserializable("response", &RequestId::String("a".into()), &e);
        assert_eq!(value["id"], "a");
        assert_eq!(value["error"]["code"], -32603);
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("key must be a string"));
    }
}
