//! Tool registration and dispatch.

use std::sync::Arc;

use serde_json::Value;

use crate::session::AggregationSession;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::{aggregate, ensure_no_gaps, get_aggregated_data};

pub struct ToolRegistry;

impl ToolRegistry {
    pub fn list_tools() -> Vec<ToolDefinition> {
        vec![
            get_aggregated_data::definition(),
            ensure_no_gaps::definition(),
            aggregate::definition(),
        ]
    }

    pub async fn call(
        name: &str,
        arguments: Option<Value>,
        session: &Arc<AggregationSession>,
    ) -> McpResult<ToolCallResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            "get_aggregated_data" => get_aggregated_data::execute(args, session).await,
            "ensure_no_gaps" => ensure_no_gaps::execute(args, session).await,
            "aggregate" => aggregate::execute(args, session).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
