//! Tool: ensure_no_gaps: insert zero points for days missing a midnight point.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use bucketsum::TimeWindow;

use crate::session::AggregationSession;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct GapFillParams {
    dt_from: String,
    dt_upto: String,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "ensure_no_gaps".to_string(),
        description: Some(
            "Insert {dt: midnight, value: 0} for every calendar day in range that has no \
             point at exactly midnight. Safe to repeat."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "dt_from": { "type": "string", "description": "YYYY-MM-DDTHH:MM:SS" },
                "dt_upto": { "type": "string", "description": "YYYY-MM-DDTHH:MM:SS" }
            },
            "required": ["dt_from", "dt_upto"]
        }),
    }
}

pub async fn execute(
    args: Value,
    session: &Arc<AggregationSession>,
) -> McpResult<ToolCallResult> {
    let params: GapFillParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let engine = session.engine();
    engine.collection()?;
    let window = TimeWindow::parse(&params.dt_from, &params.dt_upto)?;
    let report = engine.ensure_no_gaps(&window).await?;

    Ok(ToolCallResult::json(&report))
}
