//! Per-run mutable state: variables, per-action records, current position.
//!
//! The executor exclusively owns one `ExecutionContext` for the lifetime of a
//! run. Variables are seeded empty; only the verification-handling step in
//! the executor writes the `verified_*` / `last_verification_*` names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub protocol_id: String,
    pub variables: BTreeMap<String, Value>,
    pub action_results: Vec<ActionRecord>,
    pub current_index: usize,
}

impl ExecutionContext {
    pub fn new(protocol_id: impl Into<String>) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            variables: BTreeMap::new(),
            action_results: Vec::new(),
            current_index: 0,
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Number of actions that completed without an error.
    pub fn completed(&self) -> usize {
        self.action_results
            .iter()
            .filter(|r| r.error.is_none())
            .count()
    }
}

/// One entry in `action_results`. `result` is the handler's return value
/// (absent on failure); `error` is the human-readable failure text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ActionRecord {
    pub fn success(action_name: impl Into<String>, result: Value, elapsed_ms: u64) -> Self {
        Self {
            action_name: action_name.into(),
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
            elapsed_ms,
        }
    }

    pub fn failure(action_name: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            action_name: action_name.into(),
            result: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_counts_only_clean_records() {
        let mut ctx = ExecutionContext::new("p1");
        ctx.action_results
            .push(ActionRecord::success("open_app", json!({"ok": true}), 3));
        ctx.action_results
            .push(ActionRecord::failure("type", "keyboard backend not injected", 1));
        assert_eq!(ctx.completed(), 1);
    }

    #[test]
    fn variables_overwrite_by_name() {
        let mut ctx = ExecutionContext::new("p1");
        ctx.set_variable("verified_x", json!(100));
        ctx.set_variable("verified_x", json!(240));
        assert_eq!(ctx.variable("verified_x"), Some(&json!(240)));
    }
}
