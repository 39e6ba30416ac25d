//! Wire-level protocol model shared by every other crate.
//!
//! A protocol is a declarative JSON program: metadata, an optional table of
//! named macros, and an ordered list of actions. This crate owns the serde
//! shapes for that document (field names are part of the external format and
//! must not drift) plus the run-side records: execution context, per-action
//! records, verification results, and the final execution report.
//!
//! Validation does not live here. The parser crate layers structural and
//! semantic checks on top of these types; this crate only guarantees that a
//! well-formed document round-trips byte-stably through serde.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

mod context;
mod report;

pub use context::{ActionRecord, ExecutionContext};
pub use report::{ExecutionError, ExecutionResult, RunStatus};

/// Reserved action name for macro invocation. Not a primitive handler: the
/// executor intercepts it and drives the expander instead.
pub const MACRO_ACTION: &str = "macro";

/// Context variable names the visual verifier is allowed to inject. The
/// parser treats these as always-available when checking macro token hygiene.
pub const CONTEXT_VARIABLES: &[&str] = &[
    "verified_x",
    "verified_y",
    "last_verification_safe",
    "last_verification_confidence",
    "last_verification_analysis",
    "suggested_actions",
];

/// Ordered body of a named macro. The macro's name lives in the key of
/// [`Protocol::macros`]; on the wire a macro is just an array of actions.
pub type MacroBody = Vec<ActionSpec>;

/// A complete protocol document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub version: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub macros: BTreeMap<String, MacroBody>,
    pub actions: Vec<ActionSpec>,
}

impl Protocol {
    /// Deserialize without validation. The parser crate is the entry point
    /// that also produces errors/warnings; this is for trusted inputs and
    /// round-trip tests.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of top-level actions (macro calls count as one).
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub description: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub uses_vision: bool,
    #[serde(default)]
    pub estimated_duration_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Medium,
    Complex,
}

/// One instruction. `wait_after_ms` is `None` when the document omitted the
/// field, letting the executor substitute its configured default; an explicit
/// `0` stays `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "action")]
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
            wait_after_ms: None,
            description: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn with_wait(mut self, ms: u64) -> Self {
        self.wait_after_ms = Some(ms);
        self
    }

    /// Whether this action is a macro invocation.
    pub fn is_macro(&self) -> bool {
        self.name == MACRO_ACTION
    }
}

// -------------------------------------------------------------------------------------------------
// Verification
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Structured verdict from the visual verifier. Never constructed by
/// handlers other than the vision actions; the executor mirrors its fields
/// into context variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub safe_to_proceed: bool,
    pub confidence: f64,
    pub analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_coordinates: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_actions: Option<Vec<String>>,
    #[serde(default)]
    pub model_used: String,
}

impl VerificationResult {
    /// The verdict used when both vision models failed: not safe, zero
    /// confidence, the error text as analysis. The verifier never raises.
    pub fn failure(analysis: impl Into<String>) -> Self {
        Self {
            safe_to_proceed: false,
            confidence: 0.0,
            analysis: analysis.into(),
            updated_coordinates: None,
            suggested_actions: None,
            model_used: String::new(),
        }
    }

    /// Fixed verdict returned by `verify_screen` under dry-run.
    pub fn dry_run() -> Self {
        Self {
            safe_to_proceed: true,
            confidence: 1.0,
            analysis: "dry-run: verification skipped".to_string(),
            updated_coordinates: None,
            suggested_actions: None,
            model_used: "dry-run".to_string(),
        }
    }
}
