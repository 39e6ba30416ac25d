//! The individual validation passes.

use super::{
    ValidatorHints, all_actions, call_sites, check_action_params, has_token, literal_macro_name,
    total_wait_ms,
};
use core_protocol::{CONTEXT_VARIABLES, MACRO_ACTION, Protocol};
use core_registry::Registry;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

const TOP_LEVEL_KEYS: &[&str] = &["version", "metadata", "macros", "actions"];
const METADATA_KEYS: &[&str] = &[
    "description",
    "complexity",
    "uses_vision",
    "estimated_duration_seconds",
];
const ACTION_KEYS: &[&str] = &["action", "params", "wait_after_ms", "description"];
const COMPLEXITIES: &[&str] = &["simple", "medium", "complex"];

// -------------------------------------------------------------------------------------------------
// 1. Structural shape
// -------------------------------------------------------------------------------------------------

pub(crate) fn structural(value: &Value, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let Some(root) = value.as_object() else {
        errors.push("protocol document must be a JSON object".to_string());
        return;
    };

    for key in root.keys() {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            warnings.push(format!("unknown top-level key `{key}`"));
        }
    }

    match root.get("version") {
        Some(Value::String(v)) if !v.is_empty() => {}
        Some(Value::String(_)) => errors.push("`version` must be non-empty".to_string()),
        Some(_) => errors.push("`version` must be a string".to_string()),
        None => errors.push("missing `version`".to_string()),
    }

    match root.get("metadata") {
        Some(Value::Object(meta)) => structural_metadata(meta, errors, warnings),
        Some(_) => errors.push("`metadata` must be an object".to_string()),
        None => errors.push("missing `metadata`".to_string()),
    }

    match root.get("actions") {
        Some(Value::Array(actions)) if actions.is_empty() => {
            errors.push("`actions` must not be empty".to_string());
        }
        Some(Value::Array(actions)) => {
            for (i, action) in actions.iter().enumerate() {
                structural_action(&format!("actions[{i}]"), action, errors, warnings);
            }
        }
        Some(_) => errors.push("`actions` must be an array".to_string()),
        None => errors.push("missing `actions`".to_string()),
    }

    match root.get("macros") {
        None => {}
        Some(Value::Object(macros)) => {
            for (name, body) in macros {
                if name.is_empty() {
                    errors.push("macro names must be non-empty".to_string());
                }
                match body {
                    Value::Array(actions) if actions.is_empty() => {
                        errors.push(format!("macro `{name}` has an empty body"));
                    }
                    Value::Array(actions) => {
                        for (i, action) in actions.iter().enumerate() {
                            structural_action(
                                &format!("macros.{name}[{i}]"),
                                action,
                                errors,
                                warnings,
                            );
                        }
                    }
                    _ => errors.push(format!("macro `{name}` must be an array of actions")),
                }
            }
        }
        Some(_) => errors.push("`macros` must be an object".to_string()),
    }
}

fn structural_metadata(
    meta: &serde_json::Map<String, Value>,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    for key in meta.keys() {
        if !METADATA_KEYS.contains(&key.as_str()) {
            warnings.push(format!("unknown metadata key `{key}`"));
        }
    }
    match meta.get("description") {
        Some(Value::String(d)) if !d.is_empty() => {}
        Some(Value::String(_)) => errors.push("`metadata.description` must be non-empty".to_string()),
        Some(_) => errors.push("`metadata.description` must be a string".to_string()),
        None => errors.push("missing `metadata.description`".to_string()),
    }
    if let Some(complexity) = meta.get("complexity") {
        match complexity.as_str() {
            Some(c) if COMPLEXITIES.contains(&c) => {}
            _ => errors.push(format!(
                "`metadata.complexity` must be one of {COMPLEXITIES:?}"
            )),
        }
    }
    if let Some(uses_vision) = meta.get("uses_vision") {
        if !uses_vision.is_boolean() {
            errors.push("`metadata.uses_vision` must be a bool".to_string());
        }
    }
    if let Some(estimate) = meta.get("estimated_duration_seconds") {
        if estimate.as_u64().is_none() {
            errors.push("`metadata.estimated_duration_seconds` must be a non-negative integer".to_string());
        }
    }
}

fn structural_action(
    location: &str,
    value: &Value,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let Some(action) = value.as_object() else {
        errors.push(format!("{location}: action must be an object"));
        return;
    };
    for key in action.keys() {
        if !ACTION_KEYS.contains(&key.as_str()) {
            warnings.push(format!("{location}: unknown action key `{key}`"));
        }
    }
    match action.get("action") {
        Some(Value::String(name)) if !name.is_empty() => {}
        Some(_) | None => errors.push(format!("{location}: missing `action` name")),
    }
    if let Some(params) = action.get("params") {
        if !params.is_object() {
            errors.push(format!("{location}: `params` must be an object"));
        }
    }
    if let Some(wait) = action.get("wait_after_ms") {
        if wait.as_u64().is_none() {
            errors.push(format!(
                "{location}: `wait_after_ms` must be a non-negative integer"
            ));
        }
    }
    if let Some(description) = action.get("description") {
        if !description.is_string() {
            errors.push(format!("{location}: `description` must be a string"));
        }
    }
}

// -------------------------------------------------------------------------------------------------
// 2. Action surface against the registry
// -------------------------------------------------------------------------------------------------

pub(crate) fn action_surface(
    protocol: &Protocol,
    registry: &Registry,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    for (location, action) in all_actions(protocol) {
        let Some(entry) = registry.entry(&action.name) else {
            errors.push(format!("{location}: unknown action `{}`", action.name));
            continue;
        };
        check_action_params(&location, &entry.def, &action.params, errors, warnings);

        if action.name == MACRO_ACTION {
            if let Some(name) = literal_macro_name(action) {
                if !protocol.macros.contains_key(name) {
                    errors.push(format!("{location}: macro `{name}` is not defined"));
                }
            } else if let Some(Value::String(templated)) = action.params.get("name") {
                // A tokenized macro name defeats static reference checking.
                warnings.push(format!(
                    "{location}: macro name `{templated}` is resolved at run time"
                ));
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
// 3. Macro reference cycles (DFS, gray/black coloring)
// -------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

pub(crate) fn macro_cycles(protocol: &Protocol, errors: &mut Vec<String>) {
    let edges: BTreeMap<&str, Vec<&str>> = protocol
        .macros
        .iter()
        .map(|(name, body)| {
            let refs = body.iter().filter_map(literal_macro_name).collect();
            (name.as_str(), refs)
        })
        .collect();

    let mut colors: BTreeMap<&str, Color> =
        edges.keys().map(|&name| (name, Color::White)).collect();

    fn visit<'a>(
        node: &'a str,
        edges: &BTreeMap<&'a str, Vec<&'a str>>,
        colors: &mut BTreeMap<&'a str, Color>,
        path: &mut Vec<&'a str>,
        errors: &mut Vec<String>,
    ) {
        colors.insert(node, Color::Gray);
        path.push(node);
        for &next in edges.get(node).into_iter().flatten() {
            match colors.get(next) {
                Some(Color::Gray) => {
                    // Render the cycle from its first occurrence on the path.
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[start..].to_vec();
                    cycle.push(next);
                    errors.push(format!("cyclic macro reference: {}", cycle.join(" -> ")));
                }
                Some(Color::White) => visit(next, edges, colors, path, errors),
                // Black or undefined (undefined is reported by the surface
                // check).
                _ => {}
            }
        }
        path.pop();
        colors.insert(node, Color::Black);
    }

    let names: Vec<&str> = edges.keys().copied().collect();
    for name in names {
        if colors[name] == Color::White {
            let mut path = Vec::new();
            visit(name, &edges, &mut colors, &mut path, errors);
        }
    }
}

// -------------------------------------------------------------------------------------------------
// 4. Macro variable hygiene
// -------------------------------------------------------------------------------------------------

pub(crate) fn variable_hygiene(
    protocol: &Protocol,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    for (name, body) in &protocol.macros {
        let tokens = core_expand::body_tokens(body);
        let sites = call_sites(protocol, name);
        if sites.is_empty() {
            warnings.push(format!("macro `{name}` is defined but never invoked"));
            continue;
        }

        let provided: BTreeSet<&str> = sites.iter().flatten().copied().collect();
        for token in &tokens {
            let satisfied = provided.contains(token.as_str())
                || CONTEXT_VARIABLES.contains(&token.as_str());
            if !satisfied {
                errors.push(format!(
                    "macro `{name}` references `{{{{{token}}}}}` which no call site provides"
                ));
            }
        }
        for site in &sites {
            for key in site {
                if !tokens.contains(*key) {
                    warnings.push(format!(
                        "a call site passes var `{key}` that macro `{name}` never references"
                    ));
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
// 5. Timing budget (advisory)
// -------------------------------------------------------------------------------------------------

pub(crate) fn timing_budget(protocol: &Protocol, warnings: &mut Vec<String>) {
    let estimate_s = protocol.metadata.estimated_duration_seconds;
    if estimate_s == 0 {
        // No declared budget to compare against.
        return;
    }
    let total_s = total_wait_ms(protocol) as f64 / 1000.0;
    let estimate = estimate_s as f64;
    if (total_s - estimate).abs() > 0.2 * estimate {
        warnings.push(format!(
            "declared duration {estimate_s}s differs from summed waits {total_s:.1}s by more than 20%"
        ));
    }
}

// -------------------------------------------------------------------------------------------------
// 6. Coordinate bounds (advisory)
// -------------------------------------------------------------------------------------------------

pub(crate) fn coordinate_bounds(
    protocol: &Protocol,
    hints: &ValidatorHints,
    warnings: &mut Vec<String>,
) {
    if hints.screen_width == 0 || hints.screen_height == 0 {
        return;
    }
    let (w, h) = (hints.screen_width as i64, hints.screen_height as i64);

    for (location, action) in all_actions(protocol) {
        for (param, bound) in [
            ("x", w),
            ("to_x", w),
            ("width", w),
            ("y", h),
            ("to_y", h),
            ("height", h),
        ] {
            if let Some(value) = action.params.get(param) {
                if let Some(n) = literal_int(value) {
                    if n < 0 || n > bound {
                        warnings.push(format!(
                            "{location}: `{param}` = {n} is outside the {w}x{h} screen hint"
                        ));
                    }
                }
            }
        }
        if let Some(Value::Array(region)) = action.params.get("region") {
            let values: Vec<i64> = region.iter().filter_map(literal_int).collect();
            if values.len() == 4 {
                let (x, y, rw, rh) = (values[0], values[1], values[2], values[3]);
                if x < 0 || y < 0 || x + rw > w || y + rh > h {
                    warnings.push(format!(
                        "{location}: region {x},{y} {rw}x{rh} exceeds the {w}x{h} screen hint"
                    ));
                }
            }
        }
    }
}

fn literal_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !has_token(s) => s.trim().parse().ok(),
        _ => None,
    }
}
