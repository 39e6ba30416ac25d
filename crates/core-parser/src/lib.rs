//! Protocol parsing and validation.
//!
//! Turns a JSON string or already-parsed value into a [`Protocol`] plus a
//! [`ValidationResult`]. Errors are fatal (the protocol is rejected and
//! never executed); warnings surface in the report but do not block.
//!
//! Check order: structural shape first (nothing else is meaningful on a
//! malformed document), then the action surface against the registry
//! catalog, macro reference cycles, macro variable hygiene, and finally the
//! advisory timing and coordinate checks. Those two only run on otherwise
//! clean protocols because they read semantic fields the earlier checks
//! guarantee.

use core_protocol::{ActionSpec, Protocol};
use core_registry::{ActionDef, ParamKind, Registry};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

mod checks;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct ParseOutcome {
    /// Present iff the report has no errors.
    pub protocol: Option<Protocol>,
    pub report: ValidationResult,
}

/// Screen dimensions the coordinate check validates against. Zero disables
/// the check (run-time dimensions may differ anyway, which is why
/// out-of-bounds is a warning, not an error).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorHints {
    pub screen_width: u32,
    pub screen_height: u32,
}

pub fn parse_str(input: &str, registry: &Registry, hints: &ValidatorHints) -> ParseOutcome {
    match serde_json::from_str::<Value>(input) {
        Ok(value) => parse_value(value, registry, hints),
        Err(e) => ParseOutcome {
            protocol: None,
            report: ValidationResult {
                is_valid: false,
                errors: vec![format!("document is not valid JSON: {e}")],
                warnings: Vec::new(),
            },
        },
    }
}

pub fn parse_value(value: Value, registry: &Registry, hints: &ValidatorHints) -> ParseOutcome {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    checks::structural(&value, &mut errors, &mut warnings);
    if !errors.is_empty() {
        return reject(errors, warnings);
    }

    let protocol: Protocol = match serde_json::from_value(value) {
        Ok(p) => p,
        Err(e) => {
            errors.push(format!("protocol decode failed: {e}"));
            return reject(errors, warnings);
        }
    };

    checks::action_surface(&protocol, registry, &mut errors, &mut warnings);
    checks::macro_cycles(&protocol, &mut errors);
    checks::variable_hygiene(&protocol, &mut errors, &mut warnings);
    if !errors.is_empty() {
        return reject(errors, warnings);
    }

    checks::timing_budget(&protocol, &mut warnings);
    checks::coordinate_bounds(&protocol, hints, &mut warnings);

    debug!(
        target: "protocol.parse",
        actions = protocol.actions.len(),
        macros = protocol.macros.len(),
        warnings = warnings.len(),
        "protocol_accepted"
    );
    ParseOutcome {
        protocol: Some(protocol),
        report: ValidationResult {
            is_valid: true,
            errors,
            warnings,
        },
    }
}

fn reject(errors: Vec<String>, warnings: Vec<String>) -> ParseOutcome {
    debug!(target: "protocol.parse", errors = errors.len(), "protocol_rejected");
    ParseOutcome {
        protocol: None,
        report: ValidationResult {
            is_valid: false,
            errors,
            warnings,
        },
    }
}

// -------------------------------------------------------------------------------------------------
// Shared helpers used by the check modules
// -------------------------------------------------------------------------------------------------

/// Whether a string still carries a `{{name}}` token, in which case its
/// final type and value are unknowable until run time.
fn has_token(s: &str) -> bool {
    let mut tokens = BTreeSet::new();
    core_expand::tokens_in(&Value::String(s.to_string()), &mut tokens);
    !tokens.is_empty()
}

/// The literal macro name of a `macro` action, when statically known.
fn literal_macro_name(action: &ActionSpec) -> Option<&str> {
    if !action.is_macro() {
        return None;
    }
    action
        .params
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !has_token(n))
}

/// Every action in the document paired with a location label for messages:
/// top-level actions first, then each macro body.
fn all_actions(protocol: &Protocol) -> Vec<(String, &ActionSpec)> {
    let mut out = Vec::new();
    for (i, action) in protocol.actions.iter().enumerate() {
        out.push((format!("actions[{i}]"), action));
    }
    for (name, body) in &protocol.macros {
        for (i, action) in body.iter().enumerate() {
            out.push((format!("macros.{name}[{i}]"), action));
        }
    }
    out
}

fn param_matches(kind: ParamKind, value: &Value) -> bool {
    match kind {
        ParamKind::Any => true,
        ParamKind::String => value.is_string(),
        ParamKind::Int => match value {
            Value::Number(n) => n.as_i64().is_some(),
            Value::String(s) => has_token(s) || s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        ParamKind::Float => match value {
            Value::Number(_) => true,
            Value::String(s) => has_token(s) || s.trim().parse::<f64>().is_ok(),
            _ => false,
        },
        ParamKind::Bool => match value {
            Value::Bool(_) => true,
            Value::String(s) => has_token(s) || matches!(s.trim(), "true" | "false"),
            _ => false,
        },
        ParamKind::List => value.is_array(),
        ParamKind::Map => value.is_object(),
    }
}

/// Parse-time contract check against one [`ActionDef`]. Severity differs
/// from the registry's run-time rules: unknown params only warn here.
fn check_action_params(
    location: &str,
    def: &ActionDef,
    params: &Map<String, Value>,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    for key in params.keys() {
        let known = def.required.iter().any(|p| &p.name == key)
            || def.optional.iter().any(|p| &p.spec.name == key);
        if !known {
            warnings.push(format!(
                "{location}: action `{}` does not declare param `{key}`",
                def.name
            ));
        }
    }
    for spec in &def.required {
        match params.get(&spec.name) {
            None => errors.push(format!(
                "{location}: action `{}` is missing required param `{}`",
                def.name, spec.name
            )),
            Some(value) if !param_matches(spec.kind, value) => errors.push(format!(
                "{location}: action `{}` param `{}` expects {}",
                def.name, spec.name, spec.kind
            )),
            Some(_) => {}
        }
    }
    for opt in &def.optional {
        if let Some(value) = params.get(&opt.spec.name) {
            if !param_matches(opt.spec.kind, value) {
                errors.push(format!(
                    "{location}: action `{}` param `{}` expects {}",
                    def.name, opt.spec.name, opt.spec.kind
                ));
            }
        }
    }
}

/// Macro call sites of `name` across the whole document, with their `vars`
/// key sets.
fn call_sites<'a>(protocol: &'a Protocol, name: &str) -> Vec<BTreeSet<&'a str>> {
    all_actions(protocol)
        .into_iter()
        .filter(|(_, a)| literal_macro_name(a) == Some(name))
        .map(|(_, a)| {
            a.params
                .get("vars")
                .and_then(Value::as_object)
                .map(|m| m.keys().map(String::as_str).collect())
                .unwrap_or_default()
        })
        .collect()
}

/// Sum of `wait_after_ms` across the document, expanding top-level macro
/// calls through macro bodies (nested calls included). Assumes the cycle
/// check already passed.
fn total_wait_ms(protocol: &Protocol) -> u64 {
    fn body_wait(
        protocol: &Protocol,
        name: &str,
        memo: &mut BTreeMap<String, u64>,
        visiting: &mut BTreeSet<String>,
    ) -> u64 {
        if let Some(&cached) = memo.get(name) {
            return cached;
        }
        if !visiting.insert(name.to_string()) {
            return 0;
        }
        let total = protocol
            .macros
            .get(name)
            .map(|body| {
                body.iter()
                    .map(|a| action_wait(protocol, a, memo, visiting))
                    .sum()
            })
            .unwrap_or(0);
        visiting.remove(name);
        memo.insert(name.to_string(), total);
        total
    }

    fn action_wait(
        protocol: &Protocol,
        action: &ActionSpec,
        memo: &mut BTreeMap<String, u64>,
        visiting: &mut BTreeSet<String>,
    ) -> u64 {
        let own = action.wait_after_ms.unwrap_or(0);
        match literal_macro_name(action) {
            Some(name) => own + body_wait(protocol, name, memo, visiting),
            None => own,
        }
    }

    let mut memo = BTreeMap::new();
    let mut visiting = BTreeSet::new();
    protocol
        .actions
        .iter()
        .map(|a| action_wait(protocol, a, &mut memo, &mut visiting))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_detection() {
        assert!(has_token("{{verified_x}}"));
        assert!(has_token("x = {{a}} px"));
        assert!(!has_token("{not a token}"));
        assert!(!has_token("plain"));
    }

    #[test]
    fn total_wait_counts_macro_bodies() {
        let protocol: Protocol = serde_json::from_value(serde_json::json!({
            "version": "1.0",
            "metadata": {"description": "d"},
            "macros": {
                "m": [
                    {"action": "copy", "wait_after_ms": 100},
                    {"action": "paste", "wait_after_ms": 200}
                ]
            },
            "actions": [
                {"action": "macro", "params": {"name": "m"}, "wait_after_ms": 50},
                {"action": "macro", "params": {"name": "m"}}
            ]
        }))
        .unwrap();
        assert_eq!(total_wait_ms(&protocol), 50 + 300 + 300);
    }

    #[test]
    fn known_context_variables_include_verification_names() {
        assert!(core_protocol::CONTEXT_VARIABLES.contains(&"verified_x"));
    }
}
