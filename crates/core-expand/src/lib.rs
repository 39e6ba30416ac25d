//! Variable substitution and macro expansion.
//!
//! Pure and deterministic: substitution is a function over a parameter tree
//! that returns a new tree; nothing here mutates stored protocol params or
//! touches the execution context. The executor is the only caller that
//! threads context variables in, and it re-substitutes each action right
//! before dispatch so values written by earlier actions (verification
//! coordinates in particular) are picked up at the last possible moment.
//!
//! Tokens follow the literal pattern `{{name}}` and are valid in any
//! string-valued position, including keys of nested maps. Resolution order:
//! call-site vars, then context variables, then the token is left intact.
//! An unresolved token in a required field surfaces later as a handler
//! error, not here.

use core_protocol::{ActionSpec, MacroBody};
use regex::Regex;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::trace;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("static pattern"));

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("macro `{0}` is not defined")]
    UndefinedMacro(String),
    #[error("macro `{name}` is already expanding (call stack: {stack})")]
    Cycle { name: String, stack: String },
    #[error("macro `{0}` has an empty body")]
    EmptyBody(String),
}

/// Names of the macros currently being expanded, outermost first. The
/// executor pushes before recursing into a macro's sub-actions and pops
/// after; [`expand_macro`] refuses any name already on it. The parser
/// rejects cyclic protocols statically, so tripping this at run time means
/// a protocol bypassed validation.
#[derive(Debug, Clone, Default)]
pub struct ActiveStack(SmallVec<[String; 8]>);

impl ActiveStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    fn render(&self) -> String {
        self.0.join(" -> ")
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn resolve<'a>(
    name: &str,
    vars: &'a BTreeMap<String, Value>,
    context: &'a BTreeMap<String, Value>,
) -> Option<&'a Value> {
    // Call-site vars shadow context variables.
    vars.get(name).or_else(|| context.get(name))
}

/// Replace every `{{name}}` occurrence in `input`. Unresolved tokens are
/// left verbatim.
pub fn substitute_str(
    input: &str,
    vars: &BTreeMap<String, Value>,
    context: &BTreeMap<String, Value>,
) -> String {
    TOKEN
        .replace_all(input, |caps: &regex::Captures<'_>| {
            match resolve(&caps[1], vars, context) {
                Some(value) => stringify(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Structural substitution: recurses into arrays and objects, rewriting
/// string values and string keys. Non-string leaves pass through untouched.
pub fn substitute_value(
    value: &Value,
    vars: &BTreeMap<String, Value>,
    context: &BTreeMap<String, Value>,
) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(s, vars, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, vars, context))
                .collect(),
        ),
        Value::Object(map) => Value::Object(substitute_params(map, vars, context)),
        other => other.clone(),
    }
}

pub fn substitute_params(
    params: &Map<String, Value>,
    vars: &BTreeMap<String, Value>,
    context: &BTreeMap<String, Value>,
) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| {
            (
                substitute_str(key, vars, context),
                substitute_value(value, vars, context),
            )
        })
        .collect()
}

/// Collect every `{{name}}` token reachable in a value tree (keys included).
/// The parser uses this for macro token hygiene.
pub fn tokens_in(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in TOKEN.captures_iter(s) {
                out.insert(caps[1].to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                tokens_in(item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                for caps in TOKEN.captures_iter(key) {
                    out.insert(caps[1].to_string());
                }
                tokens_in(item, out);
            }
        }
        _ => {}
    }
}

/// Tokens referenced anywhere in a macro body.
pub fn body_tokens(body: &MacroBody) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for action in body {
        for (key, value) in &action.params {
            for caps in TOKEN.captures_iter(key) {
                out.insert(caps[1].to_string());
            }
            tokens_in(value, &mut out);
        }
    }
    out
}

/// Produce the action sequence for one macro invocation: the body with every
/// param substituted against `vars` falling back to `context`. Nested
/// `macro` actions stay as `macro` actions (their `vars` values substituted);
/// the executor recurses through them with this same function, extending
/// `active` as it goes.
pub fn expand_macro(
    macros: &BTreeMap<String, MacroBody>,
    name: &str,
    vars: &BTreeMap<String, Value>,
    context: &BTreeMap<String, Value>,
    active: &ActiveStack,
) -> Result<Vec<ActionSpec>, ExpandError> {
    if active.contains(name) {
        return Err(ExpandError::Cycle {
            name: name.to_string(),
            stack: active.render(),
        });
    }
    let body = macros
        .get(name)
        .ok_or_else(|| ExpandError::UndefinedMacro(name.to_string()))?;
    if body.is_empty() {
        return Err(ExpandError::EmptyBody(name.to_string()));
    }

    trace!(target: "exec.macro", macro_name = name, actions = body.len(), depth = active.depth(), "expand");

    Ok(body
        .iter()
        .map(|action| ActionSpec {
            name: action.name.clone(),
            params: substitute_params(&action.params, vars, context),
            wait_after_ms: action.wait_after_ms,
            description: action.description.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn token_replacement_stringifies_values() {
        let v = vars(&[("q", json!("elon musk")), ("x", json!(100))]);
        let empty = BTreeMap::new();
        assert_eq!(substitute_str("{{q}}", &v, &empty), "elon musk");
        assert_eq!(substitute_str("x={{x}}", &v, &empty), "x=100");
    }

    #[test]
    fn unresolved_token_left_intact() {
        let empty = BTreeMap::new();
        assert_eq!(substitute_str("{{missing}}", &empty, &empty), "{{missing}}");
    }

    #[test]
    fn call_site_vars_shadow_context() {
        let v = vars(&[("who", json!("call-site"))]);
        let c = vars(&[("who", json!("context"))]);
        assert_eq!(substitute_str("{{who}}", &v, &c), "call-site");
        assert_eq!(substitute_str("{{who}}", &BTreeMap::new(), &c), "context");
    }

    #[test]
    fn substitution_recurses_into_lists_maps_and_keys() {
        let v = vars(&[("key", json!("field")), ("val", json!(7))]);
        let empty = BTreeMap::new();
        let input = json!({
            "{{key}}_name": ["{{val}}", {"deep": "{{val}}"}],
            "untouched": 3
        });
        let out = substitute_value(&input, &v, &empty);
        assert_eq!(
            out,
            json!({
                "field_name": ["7", {"deep": "7"}],
                "untouched": 3
            })
        );
    }

    #[test]
    fn token_collection_sees_keys_and_nested_strings() {
        let mut out = BTreeSet::new();
        tokens_in(
            &json!({"{{a}}": {"inner": ["{{b}}", 1], "plain": true}}),
            &mut out,
        );
        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    fn search_macro() -> BTreeMap<String, MacroBody> {
        let body: MacroBody = serde_json::from_value(json!([
            {"action": "shortcut", "params": {"keys": ["ctrl", "l"]}},
            {"action": "type", "params": {"text": "{{q}}"}},
            {"action": "press_key", "params": {"key": "enter"}}
        ]))
        .unwrap();
        BTreeMap::from([("search".to_string(), body)])
    }

    #[test]
    fn expansion_substitutes_call_vars() {
        let macros = search_macro();
        let out = expand_macro(
            &macros,
            "search",
            &vars(&[("q", json!("jeff bezos"))]),
            &BTreeMap::new(),
            &ActiveStack::new(),
        )
        .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].params["text"], json!("jeff bezos"));
    }

    #[test]
    fn expansion_is_idempotent_for_same_vars() {
        let macros = search_macro();
        let v = vars(&[("q", json!("elon musk"))]);
        let a = expand_macro(&macros, "search", &v, &BTreeMap::new(), &ActiveStack::new()).unwrap();
        let b = expand_macro(&macros, "search", &v, &BTreeMap::new(), &ActiveStack::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn expansion_does_not_mutate_the_stored_body() {
        let macros = search_macro();
        let v = vars(&[("q", json!("first"))]);
        expand_macro(&macros, "search", &v, &BTreeMap::new(), &ActiveStack::new()).unwrap();
        // Token must still be present for the second call.
        let out = expand_macro(
            &macros,
            "search",
            &vars(&[("q", json!("second"))]),
            &BTreeMap::new(),
            &ActiveStack::new(),
        )
        .unwrap();
        assert_eq!(out[1].params["text"], json!("second"));
    }

    #[test]
    fn undefined_macro_is_an_error() {
        assert!(matches!(
            expand_macro(
                &BTreeMap::new(),
                "nope",
                &BTreeMap::new(),
                &BTreeMap::new(),
                &ActiveStack::new()
            ),
            Err(ExpandError::UndefinedMacro(_))
        ));
    }

    #[test]
    fn active_stack_refuses_reentry() {
        let macros = search_macro();
        let mut active = ActiveStack::new();
        active.push("outer");
        active.push("search");
        let err = expand_macro(
            &macros,
            "search",
            &BTreeMap::new(),
            &BTreeMap::new(),
            &active,
        )
        .unwrap_err();
        match err {
            ExpandError::Cycle { name, stack } => {
                assert_eq!(name, "search");
                assert_eq!(stack, "outer -> search");
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn nested_macro_actions_survive_expansion() {
        let macros: BTreeMap<String, MacroBody> = serde_json::from_value(json!({
            "outer": [
                {"action": "macro", "params": {"name": "inner", "vars": {"v": "{{v}}"}}}
            ],
            "inner": [
                {"action": "type", "params": {"text": "{{v}}"}}
            ]
        }))
        .unwrap();
        let out = expand_macro(
            &macros,
            "outer",
            &vars(&[("v", json!("42"))]),
            &BTreeMap::new(),
            &ActiveStack::new(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "macro");
        // The nested call's vars were substituted, ready for the recursive
        // expansion step.
        assert_eq!(out[0].params["vars"], json!({"v": "42"}));
    }
}
