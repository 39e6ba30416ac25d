//! Execution reports returned across the boundary adapter.

use crate::ExecutionContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Stopped,
    Paused,
}

/// Structured record of the first failing action. Preserved alongside the
/// context dump so a recovery protocol can resume from `action_index + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub action_index: usize,
    pub action_name: String,
    pub error_type: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: RunStatus,
    pub actions_completed: usize,
    pub total_actions: usize,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ExecutionError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ExecutionContext>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RunStatus::Stopped).unwrap(),
            serde_json::json!("stopped")
        );
    }

    #[test]
    fn result_omits_absent_error_fields() {
        let r = ExecutionResult {
            status: RunStatus::Success,
            actions_completed: 2,
            total_actions: 2,
            duration_ms: 17,
            error: None,
            error_details: None,
            context: None,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("error").is_none());
        assert!(v.get("error_details").is_none());
    }
}
