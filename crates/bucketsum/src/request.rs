//! The engine call contract as exchanged with front-ends.

use serde::{Deserialize, Serialize};

use crate::types::{BucketSumError, BucketSumResult, GroupType};
use crate::window::TimeWindow;

/// `{"dt_from": ..., "dt_upto": ..., "group_type": ...}`
///
/// `group_type` defaults to `month` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub dt_from: String,
    pub dt_upto: String,
    #[serde(default)]
    pub group_type: GroupType,
}

impl AggregationRequest {
    pub fn new(
        dt_from: impl Into<String>,
        dt_upto: impl Into<String>,
        group_type: impl Into<GroupType>,
    ) -> Self {
        Self {
            dt_from: dt_from.into(),
            dt_upto: dt_upto.into(),
            group_type: group_type.into(),
        }
    }

    /// Parse a free-form chat message carrying a JSON request.
    pub fn parse_message(text: &str) -> BucketSumResult<Self> {
        serde_json::from_str(text.trim()).map_err(|e| {
            BucketSumError::InvalidInput(format!(
                "Expected {{\"dt_from\": ..., \"dt_upto\": ..., \"group_type\": ...}}: {e}"
            ))
        })
    }

    pub fn window(&self) -> BucketSumResult<TimeWindow> {
        TimeWindow::parse(&self.dt_from, &self.dt_upto)
    }
}
