//! Validator behavior against the builtin action surface.

use core_parser::{ParseOutcome, ValidatorHints, parse_str, parse_value};
use core_registry::{Backends, Registry};
use serde_json::{Value, json};

fn registry() -> Registry {
    Registry::with_builtins(Backends::default())
}

fn parse(value: Value) -> ParseOutcome {
    parse_value(value, &registry(), &ValidatorHints::default())
}

fn doc(actions: Value) -> Value {
    json!({
        "version": "1.0",
        "metadata": {"description": "test protocol"},
        "actions": actions
    })
}

#[test]
fn minimal_open_app_protocol_is_valid() {
    let out = parse(doc(json!([
        {"action": "open_app", "params": {"app_name": "chrome"}, "wait_after_ms": 0}
    ])));
    assert!(out.report.is_valid, "{:?}", out.report.errors);
    assert!(out.report.errors.is_empty());
    let protocol = out.protocol.expect("valid protocol");
    assert_eq!(protocol.actions.len(), 1);
}

#[test]
fn missing_required_param_rejects_the_protocol() {
    let out = parse(doc(json!([
        {"action": "open_app", "params": {}}
    ])));
    assert!(!out.report.is_valid);
    assert!(out.protocol.is_none());
    assert!(
        out.report
            .errors
            .iter()
            .any(|e| e.contains("app_name")),
        "{:?}",
        out.report.errors
    );
}

#[test]
fn unknown_action_is_fatal() {
    let out = parse(doc(json!([{"action": "levitate"}])));
    assert!(!out.report.is_valid);
    assert!(out.report.errors[0].contains("unknown action `levitate`"));
}

#[test]
fn unknown_param_only_warns() {
    let out = parse(doc(json!([
        {"action": "press_key", "params": {"key": "enter", "vigor": 11}}
    ])));
    assert!(out.report.is_valid);
    assert!(
        out.report.warnings.iter().any(|w| w.contains("vigor")),
        "{:?}",
        out.report.warnings
    );
}

#[test]
fn unknown_top_level_key_warns() {
    let mut value = doc(json!([{"action": "copy"}]));
    value["author"] = json!("someone");
    let out = parse(value);
    assert!(out.report.is_valid);
    assert!(out.report.warnings.iter().any(|w| w.contains("author")));
}

#[test]
fn structural_failures_are_fatal() {
    for bad in [
        json!({"metadata": {"description": "d"}, "actions": [{"action": "copy"}]}),
        json!({"version": "", "metadata": {"description": "d"}, "actions": [{"action": "copy"}]}),
        json!({"version": "1.0", "actions": [{"action": "copy"}]}),
        json!({"version": "1.0", "metadata": {"description": ""}, "actions": [{"action": "copy"}]}),
        json!({"version": "1.0", "metadata": {"description": "d"}, "actions": []}),
        json!({"version": "1.0", "metadata": {"description": "d", "complexity": "heroic"},
               "actions": [{"action": "copy"}]}),
    ] {
        let out = parse(bad.clone());
        assert!(!out.report.is_valid, "accepted: {bad}");
    }
}

#[test]
fn param_type_mismatch_is_fatal_but_tokens_pass() {
    let out = parse(doc(json!([
        {"action": "mouse_move", "params": {"x": [], "y": 10}}
    ])));
    assert!(!out.report.is_valid);

    let out = parse(doc(json!([
        {"action": "mouse_move", "params": {"x": "{{verified_x}}", "y": "{{verified_y}}"}}
    ])));
    assert!(out.report.is_valid, "{:?}", out.report.errors);
}

#[test]
fn undefined_macro_reference_is_fatal() {
    let out = parse(doc(json!([
        {"action": "macro", "params": {"name": "ghost"}}
    ])));
    assert!(!out.report.is_valid);
    assert!(out.report.errors[0].contains("`ghost` is not defined"));
}

#[test]
fn self_referencing_macro_is_rejected() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {"a": [{"action": "macro", "params": {"name": "a"}}]},
        "actions": [{"action": "macro", "params": {"name": "a"}}]
    }));
    assert!(!out.report.is_valid);
    assert!(
        out.report
            .errors
            .iter()
            .any(|e| e.contains("cyclic macro reference: a -> a")),
        "{:?}",
        out.report.errors
    );
}

#[test]
fn two_macro_cycle_is_rejected_citing_the_cycle() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "a": [{"action": "macro", "params": {"name": "b"}}],
            "b": [{"action": "macro", "params": {"name": "a"}}]
        },
        "actions": [{"action": "macro", "params": {"name": "a"}}]
    }));
    assert!(!out.report.is_valid);
    assert!(
        out.report
            .errors
            .iter()
            .any(|e| e.contains("a -> b -> a") || e.contains("b -> a -> b")),
        "{:?}",
        out.report.errors
    );
}

#[test]
fn three_macro_cycle_is_rejected() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "a": [{"action": "macro", "params": {"name": "b"}}],
            "b": [{"action": "macro", "params": {"name": "c"}}],
            "c": [{"action": "macro", "params": {"name": "a"}}]
        },
        "actions": [{"action": "macro", "params": {"name": "a"}}]
    }));
    assert!(!out.report.is_valid);
    assert!(out.report.errors.iter().any(|e| e.contains("cyclic")));
}

#[test]
fn acyclic_nested_macros_are_fine() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "outer": [{"action": "macro", "params": {"name": "inner"}}],
            "inner": [{"action": "copy"}]
        },
        "actions": [{"action": "macro", "params": {"name": "outer"}}]
    }));
    assert!(out.report.is_valid, "{:?}", out.report.errors);
}

#[test]
fn macro_token_without_a_provider_is_fatal() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "search": [{"action": "type", "params": {"text": "{{q}}"}}]
        },
        "actions": [{"action": "macro", "params": {"name": "search"}}]
    }));
    assert!(!out.report.is_valid);
    assert!(
        out.report.errors.iter().any(|e| e.contains("{{q}}")),
        "{:?}",
        out.report.errors
    );
}

#[test]
fn context_variable_tokens_need_no_provider() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "click_found": [{
                "action": "mouse_move",
                "params": {"x": "{{verified_x}}", "y": "{{verified_y}}"}
            }]
        },
        "actions": [{"action": "macro", "params": {"name": "click_found"}}]
    }));
    assert!(out.report.is_valid, "{:?}", out.report.errors);
}

#[test]
fn unused_call_site_var_warns() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "search": [{"action": "type", "params": {"text": "{{q}}"}}]
        },
        "actions": [{
            "action": "macro",
            "params": {"name": "search", "vars": {"q": "rust", "flair": "unused"}}
        }]
    }));
    assert!(out.report.is_valid);
    assert!(
        out.report.warnings.iter().any(|w| w.contains("flair")),
        "{:?}",
        out.report.warnings
    );
}

#[test]
fn never_invoked_macro_warns() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "orphan": [{"action": "copy"}]
        },
        "actions": [{"action": "paste"}]
    }));
    assert!(out.report.is_valid);
    assert!(out.report.warnings.iter().any(|w| w.contains("orphan")));
}

#[test]
fn timing_divergence_warns_but_does_not_block() {
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d", "estimated_duration_seconds": 60},
        "actions": [{"action": "copy", "wait_after_ms": 1000}]
    }));
    assert!(out.report.is_valid);
    assert!(
        out.report.warnings.iter().any(|w| w.contains("20%")),
        "{:?}",
        out.report.warnings
    );

    // Within 20% of the estimate: no warning.
    let out = parse(json!({
        "version": "1.0",
        "metadata": {"description": "d", "estimated_duration_seconds": 1},
        "actions": [{"action": "copy", "wait_after_ms": 1000}]
    }));
    assert!(out.report.warnings.is_empty(), "{:?}", out.report.warnings);
}

#[test]
fn coordinate_bounds_warn_only_with_hints() {
    let action = json!([{"action": "mouse_move", "params": {"x": 5000, "y": 10}}]);

    let no_hints = parse(doc(action.clone()));
    assert!(no_hints.report.warnings.is_empty());

    let hinted = parse_value(
        doc(action),
        &registry(),
        &ValidatorHints {
            screen_width: 1920,
            screen_height: 1080,
        },
    );
    assert!(hinted.report.is_valid, "warnings must not block execution");
    assert!(
        hinted.report.warnings.iter().any(|w| w.contains("5000")),
        "{:?}",
        hinted.report.warnings
    );
}

#[test]
fn parse_str_round_trips_through_serialization() {
    let input = r#"{
        "version": "1.0",
        "metadata": {"description": "round trip", "complexity": "medium"},
        "macros": {"m": [{"action": "copy", "wait_after_ms": 10}]},
        "actions": [
            {"action": "macro", "params": {"name": "m"}},
            {"action": "type", "params": {"text": "hi"}, "wait_after_ms": 5}
        ]
    }"#;
    let first = parse_str(input, &registry(), &ValidatorHints::default());
    let protocol = first.protocol.expect("valid");
    let serialized = protocol.to_json_string().unwrap();
    let second = parse_str(&serialized, &registry(), &ValidatorHints::default());
    assert_eq!(second.protocol.as_ref(), Some(&protocol));
    assert_eq!(
        second.protocol.unwrap().to_json_string().unwrap(),
        serialized
    );
}

#[test]
fn invalid_json_reports_one_error() {
    let out = parse_str("{not json", &registry(), &ValidatorHints::default());
    assert!(!out.report.is_valid);
    assert_eq!(out.report.errors.len(), 1);
    assert!(out.report.errors[0].contains("not valid JSON"));
}
