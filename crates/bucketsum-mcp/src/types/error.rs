//! Server errors and their JSON-RPC codes.

use bucketsum::BucketSumError;

use super::message::{JsonRpcError, JsonRpcErrorObject, RequestId, JSONRPC_VERSION};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Server-defined error codes.
pub mod mcp_error_codes {
    pub const TOOL_NOT_FOUND: i32 = -32803;
    pub const NOT_INITIALIZED: i32 = -32860;
    pub const STORE_NOT_FOUND: i32 = -32861;
    pub const STORE_CONNECTION: i32 = -32862;
    pub const STORE_ERROR: i32 = -32863;
}

#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Session already closed")]
    SessionClosed,

    #[error("Aggregation engine is not initialized; check the store configuration")]
    NotInitialized,

    #[error("Not found: {0}")]
    StoreNotFound(String),

    #[error("Store unreachable: {0}")]
    StoreConnection(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use mcp_error_codes::*;
        match self {
            McpError::ParseError(_) | McpError::Json(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::InternalError(_) | McpError::SessionClosed | McpError::Io(_) => {
                INTERNAL_ERROR
            }
            McpError::ToolNotFound(_) => TOOL_NOT_FOUND,
            McpError::NotInitialized => NOT_INITIALIZED,
            McpError::StoreNotFound(_) => STORE_NOT_FOUND,
            McpError::StoreConnection(_) => STORE_CONNECTION,
            McpError::Store(_) => STORE_ERROR,
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcErrorObject {
                code: self.code(),
                message: self.to_string(),
                data: None,
            },
        }
    }
}

impl From<BucketSumError> for McpError {
    fn from(e: BucketSumError) -> Self {
        match e {
            BucketSumError::InvalidRange(msg) | BucketSumError::InvalidInput(msg) => {
                McpError::InvalidParams(msg)
            }
            BucketSumError::NotInitialized => McpError::NotInitialized,
            BucketSumError::NotFound(msg) => McpError::StoreNotFound(msg),
            BucketSumError::Connection(msg) => McpError::StoreConnection(msg),
            other => McpError::Store(other.to_string()),
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        let cases = [
            (BucketSumError::InvalidRange("x".into()), -32602),
            (BucketSumError::InvalidInput("x".into()), -32602),
            (BucketSumError::NotInitialized, -32860),
            (BucketSumError::NotFound("db".into()), -32861),
            (BucketSumError::Connection("down".into()), -32862),
            (BucketSumError::Store("boom".into()), -32863),
        ];
        for (err, code) in cases {
            assert_eq!(McpError::from(err).code(), code);
        }
    }

    #[test]
    fn test_json_rpc_error_shape() {
        let err = McpError::StoreNotFound("couldn't find db database".into());
        let value = serde_json::to_value(err.to_json_rpc_error(RequestId::Number(4))).unwrap();
        assert_eq!(value["id"], 4);
        assert_eq!(value["error"]["code"], -32861);
        assert!(value["error"]["message"]
            .as_str()
            .unwrap()
            .contains("couldn't find db database"));
    }
}
