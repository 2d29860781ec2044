//! Tool listing and tool call results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(default, rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    pub fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text { text }],
            is_error: None,
        }
    }

    /// Compact JSON, the shape a chat client relays verbatim. A value that
    /// cannot be serialized yields an error result carrying the reason.
    pub fn json(value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(text) => Self::text(text),
            Err(e) => {
                tracing::warn!("Failed to serialize tool result: {e}");
                Self {
                    is_error: Some(true),
                    ..Self::text(format!("Failed to serialize result: {e}"))
                }
            }
        }
    }

    /// Append a trailing text item, e.g. a warning.
    pub fn with_note(mut self, note: Option<String>) -> Self {
        if let Some(text) = note {
            self.content.push(ToolContent::Text { text });
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolListResult {
    pub tools: Vec<ToolDefinition>,
    #[serde(default, rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_result_is_compact() {
        let result = ToolCallResult::json(&serde_json::json!({"dataset": [7], "labels": ["x"]}));
        assert_eq!(result.is_error, None);
        let ToolContent::Text { text } = &result.content[0];
        assert_eq!(text, r#"{"dataset":[7],"labels":["x"]}"#);
    }

    #[test]
    fn test_unserializable_value_is_error_result() {
        let mut value = HashMap::new();
        value.insert((1, 2), 3);

        let result = ToolCallResult::json(&value);
        assert_eq!(result.is_error, Some(true));
        let ToolContent::Text { text } = &result.content[0];
        assert!(text.starts_with("Failed to serialize result"), "{text}");
    }
}
