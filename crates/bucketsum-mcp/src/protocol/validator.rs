//! Envelope checks applied before dispatch.

use crate::types::{JsonRpcRequest, McpError, McpResult, JSONRPC_VERSION};

pub fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.trim().is_empty() {
        return Err(McpError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    if let Some(params) = &request.params {
        if !(params.is_object() || params.is_array() || params.is_null()) {
            return Err(McpError::InvalidRequest(
                "params must be an object or an array".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    fn request(jsonrpc: &str, method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: jsonrpc.to_string(),
            id: RequestId::Number(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_accepts_well_formed() {
        assert!(validate_request(&request("2.0", "tools/list", None)).is_ok());
        assert!(validate_request(&request("2.0", "tools/call", Some(json!({})))).is_ok());
    }

    #[test]
    fn test_rejects_bad_envelopes() {
        assert!(validate_request(&request("1.0", "ping", None)).is_err());
        assert!(validate_request(&request("2.0", " ", None)).is_err());
        assert!(validate_request(&request("2.0", "ping", Some(json!("x")))).is_err());
    }
}
