//! Tool: aggregate: bucketed sums without touching the store.

use std::sync::Arc;

use serde_json::{json, Value};

use bucketsum::AggregationRequest;

use crate::session::AggregationSession;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "aggregate".to_string(),
        description: Some(
            "Sum `value` per hour, day or month between two timestamps, read-only. \
             Days without data may be missing from the result."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "dt_from": { "type": "string", "description": "Inclusive start, YYYY-MM-DDTHH:MM:SS" },
                "dt_upto": { "type": "string", "description": "Inclusive end, YYYY-MM-DDTHH:MM:SS" },
                "group_type": {
                    "type": "string",
                    "enum": ["hour", "day", "month"],
                    "default": "month"
                }
            },
            "required": ["dt_from", "dt_upto"]
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<AggregationSession>,
) -> McpResult<ToolCallResult> {
    let request: AggregationRequest =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let engine = session.engine();
    engine.collection()?;
    let window = request.window()?;
    let result = engine.aggregate(&window, request.group_type.resolve()).await?;

    Ok(ToolCallResult::json(&result).with_note(request.group_type.warning()))
}
