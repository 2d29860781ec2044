//! Newline-delimited JSON framing.

use crate::types::{JsonRpcMessage, McpError, McpResult};

/// Parse one line as a JSON-RPC message.
pub fn parse_message(line: &str) -> McpResult<JsonRpcMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(McpError::ParseError("Empty message".to_string()));
    }

    serde_json::from_str(trimmed).map_err(|e| McpError::ParseError(e.to_string()))
}

/// Serialize a value as one line, newline included.
pub fn frame_message(value: &serde_json::Value) -> McpResult<String> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_and_notification() {
        let request = parse_message(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#).unwrap();
        assert!(matches!(request, JsonRpcMessage::Request(_)));

        let notification =
            parse_message(r#" {"jsonrpc":"2.0","method":"notifications/initialized"} "#).unwrap();
        assert!(matches!(notification, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_message("   "), Err(McpError::ParseError(_))));
        assert!(matches!(parse_message("{not json"), Err(McpError::ParseError(_))));
    }

    #[test]
    fn test_frame_is_single_line() {
        let framed = frame_message(&json!({"dataset": [1, 2], "labels": ["a", "b"]})).unwrap();
        assert!(framed.ends_with('\n'));
        assert_eq!(framed.matches('\n').count(), 1);
    }
}
