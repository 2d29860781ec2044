//! Tool: get_aggregated_data: gap-fill, then bucketed sums.

use std::sync::Arc;

use serde_json::{json, Value};

use bucketsum::AggregationRequest;

use crate::session::AggregationSession;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "get_aggregated_data".to_string(),
        description: Some(
            "Sum `value` per hour, day or month between two timestamps. Inserts zero \
             points for calendar days with no data at midnight before aggregating."
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
                    "default": "month",
                    "description": "Bucket size; anything else is grouped by month"
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

    let result = session.engine().run(&request).await?;

    Ok(ToolCallResult::json(&result).with_note(request.group_type.warning()))
}
