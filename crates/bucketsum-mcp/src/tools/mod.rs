//! MCP tools over the aggregation engine.

pub mod aggregate;
pub mod ensure_no_gaps;
pub mod get_aggregated_data;
pub mod registry;

pub use registry::ToolRegistry;
