//! bucketsum MCP server: chat access to gap-free, time-bucketed sums.

pub mod config;
pub mod protocol;
pub mod repl;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{resolve_config_path, ServerConfig};
pub use protocol::ProtocolHandler;
pub use session::AggregationSession;
pub use transport::StdioTransport;
