//! Initialize handshake state.

use crate::types::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, McpResult, MCP_VERSION,
};

#[derive(Debug, Clone, Default)]
pub struct NegotiatedCapabilities {
    client: ClientCapabilities,
    client_info: Option<Implementation>,
    initialized: bool,
}

impl NegotiatedCapabilities {
    /// Record the client and answer with the server's own protocol version.
    pub fn negotiate(&mut self, params: InitializeParams) -> McpResult<InitializeResult> {
        if params.protocol_version != MCP_VERSION {
            tracing::warn!(
                "Client requested protocol version {}, server supports {}. Proceeding with server version.",
                params.protocol_version,
                MCP_VERSION
            );
        }

        tracing::info!(
            "Initialized with client: {} v{}",
            params.client_info.name,
            params.client_info.version
        );

        self.client = params.capabilities;
        self.client_info = Some(params.client_info);

        Ok(InitializeResult::default_result())
    }

    pub fn mark_initialized(&mut self) {
        if self.client_info.is_none() {
            tracing::warn!("Received initialized notification before initialize");
        }
        self.initialized = true;

        let mut declared: Vec<&str> = self.client.declared.keys().map(String::as_str).collect();
        declared.sort_unstable();
        tracing::info!(
            "MCP handshake complete with {} (client capabilities: [{}])",
            self.client_name(),
            declared.join(", ")
        );
    }

    /// Whether the client finished the handshake with `initialized`.
    pub fn is_ready(&self) -> bool {
        self.initialized
    }

    pub fn client_name(&self) -> &str {
        self.client_info
            .as_ref()
            .map(|info| info.name.as_str())
            .unwrap_or("unknown client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(version: &str) -> InitializeParams {
        serde_json::from_value(json!({
            "protocolVersion": version,
            "capabilities": {"roots": {}},
            "clientInfo": {"name": "inspector", "version": "0.3.0"}
        }))
        .unwrap()
    }

    #[test]
    fn test_handshake_tracks_client() {
        let mut caps = NegotiatedCapabilities::default();
        assert!(!caps.is_ready());
        assert_eq!(caps.client_name(), "unknown client");

        let result = caps.negotiate(params(MCP_VERSION)).unwrap();
        assert_eq!(result.protocol_version, MCP_VERSION);
        assert_eq!(caps.client_name(), "inspector");
        assert!(!caps.is_ready());

        caps.mark_initialized();
        assert!(caps.is_ready());
    }

    #[test]
    fn test_other_protocol_version_gets_server_version() {
        let mut caps = NegotiatedCapabilities::default();
        let result = caps.negotiate(params("1999-01-01")).unwrap();
        assert_eq!(result.protocol_version, MCP_VERSION);
    }
}
