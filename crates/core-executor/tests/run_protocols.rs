//! End-to-end runs against recording backends.

mod common;

use common::{EventLog, recording_registry};
use core_executor::{ExecOptions, Executor};
use core_input::AbortFlag;
use core_protocol::{Protocol, RunStatus};
use serde_json::json;
use std::sync::Arc;

fn executor(registry: core_registry::Registry, options: ExecOptions) -> Executor {
    Executor::new(Arc::new(registry), options, AbortFlag::new())
}

fn protocol(value: serde_json::Value) -> Protocol {
    serde_json::from_value(value).expect("test protocol shape")
}

#[test]
fn single_open_app_succeeds() {
    let log = EventLog::new();
    let exec = executor(recording_registry(&log, None), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "actions": [
            {"action": "open_app", "params": {"app_name": "chrome"}, "wait_after_ms": 0}
        ]
    })));
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.actions_completed, 1);
    assert_eq!(result.total_actions, 1);
    assert!(result.error.is_none());
    // launcher chord, typed name, enter
    let entries = log.entries();
    assert!(entries.iter().any(|e| e.starts_with("chord:")), "{entries:?}");
    assert!(entries.iter().any(|e| e.starts_with("type:chrome")));
    assert!(entries.contains(&"tap:enter".to_string()));
}

#[test]
fn macro_with_vars_runs_twice_in_declared_order() {
    let log = EventLog::new();
    let exec = executor(recording_registry(&log, None), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "search": [
                {"action": "shortcut", "params": {"keys": ["ctrl", "l"]}},
                {"action": "type", "params": {"text": "{{q}}"}},
                {"action": "press_key", "params": {"key": "enter"}}
            ]
        },
        "actions": [
            {"action": "macro", "params": {"name": "search", "vars": {"q": "elon musk"}}},
            {"action": "macro", "params": {"name": "search", "vars": {"q": "jeff bezos"}}}
        ]
    })));
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.actions_completed, 2);
    assert_eq!(
        log.entries(),
        vec![
            "chord:ctrl+l",
            "type:elon musk:0",
            "tap:enter",
            "chord:ctrl+l",
            "type:jeff bezos:0",
            "tap:enter",
        ]
    );
}

#[test]
fn verified_coordinates_feed_the_next_action() {
    let log = EventLog::new();
    let reply = r#"{"safe_to_proceed": true, "confidence": 0.95,
                    "analysis": "button found",
                    "updated_coordinates": {"x": 100, "y": 200}}"#;
    let exec = executor(recording_registry(&log, Some(reply)), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d", "uses_vision": true},
        "actions": [
            {"action": "verify_screen",
             "params": {"context": "looking for the button", "expected": "button visible"}},
            {"action": "mouse_move",
             "params": {"x": "{{verified_x}}", "y": "{{verified_y}}", "smooth": false}}
        ]
    })));
    assert_eq!(result.status, RunStatus::Success, "{:?}", result.error);
    assert!(
        log.entries().contains(&"move:100,200:smooth=false".to_string()),
        "{:?}",
        log.entries()
    );
    let context = result.context.expect("context snapshot");
    assert_eq!(context.variables["verified_x"], json!(100));
    assert_eq!(context.variables["verified_y"], json!(200));
    assert_eq!(context.variables["last_verification_safe"], json!(true));
}

#[test]
fn unsafe_verification_warns_but_does_not_halt() {
    let log = EventLog::new();
    let reply = r#"{"safe_to_proceed": false, "confidence": 0.9, "analysis": "wrong page"}"#;
    let exec = executor(recording_registry(&log, Some(reply)), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d", "uses_vision": true},
        "actions": [
            {"action": "verify_screen", "params": {"context": "c", "expected": "e"}},
            {"action": "press_key", "params": {"key": "enter"}}
        ]
    })));
    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.actions_completed, 2);
    let context = result.context.unwrap();
    assert_eq!(context.variables["last_verification_safe"], json!(false));
    assert!(log.entries().contains(&"tap:enter".to_string()));
}

#[test]
fn failing_action_ends_the_run_with_details() {
    // No keyboard backend: press_key must fail, mouse_position first must
    // succeed.
    let log = EventLog::new();
    let mut registry = recording_registry(&log, None);
    let mut deps = core_registry::Backends::default();
    deps.pointer = Some(Arc::new(common::RecordingPointer { log: log.clone() }));
    registry.inject_dependencies(deps);

    let exec = executor(registry, ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "actions": [
            {"action": "mouse_position"},
            {"action": "press_key", "params": {"key": "enter"}},
            {"action": "mouse_position"}
        ]
    })));
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.actions_completed, 1);
    let details = result.error_details.expect("failure details");
    assert_eq!(details.action_index, 1);
    assert_eq!(details.action_name, "press_key");
    assert_eq!(details.error_type, "BackendUnavailable");

    // Records before the failing index carry no error.
    let context = result.context.unwrap();
    assert_eq!(context.action_results.len(), 2);
    assert!(context.action_results[0].error.is_none());
    assert!(context.action_results[1].error.is_some());
}

#[test]
fn unknown_action_at_run_time_fails_with_taxonomy_type() {
    let log = EventLog::new();
    let exec = executor(recording_registry(&log, None), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "actions": [{"action": "defenestrate"}]
    })));
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.error_details.unwrap().error_type, "UnknownAction");
}

#[test]
fn nested_macros_share_the_context_and_expand_fully() {
    let log = EventLog::new();
    let exec = executor(recording_registry(&log, None), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "outer": [
                {"action": "press_key", "params": {"key": "a"}},
                {"action": "macro", "params": {"name": "inner", "vars": {"k": "{{k}}"}}}
            ],
            "inner": [
                {"action": "press_key", "params": {"key": "{{k}}"}}
            ]
        },
        "actions": [
            {"action": "macro", "params": {"name": "outer", "vars": {"k": "z"}}}
        ]
    })));
    assert_eq!(result.status, RunStatus::Success, "{:?}", result.error);
    assert_eq!(log.entries(), vec!["tap:a", "tap:z"]);
}

#[test]
fn runtime_macro_cycle_is_caught_by_the_active_stack() {
    // The parser rejects this statically; executing it anyway must fail
    // cleanly instead of recursing forever.
    let log = EventLog::new();
    let exec = executor(recording_registry(&log, None), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "macros": {
            "a": [{"action": "macro", "params": {"name": "b"}}],
            "b": [{"action": "macro", "params": {"name": "a"}}]
        },
        "actions": [{"action": "macro", "params": {"name": "a"}}]
    })));
    assert_eq!(result.status, RunStatus::Failed);
    let details = result.error_details.unwrap();
    assert_eq!(details.error_type, "MacroError");
    assert!(details.error_message.contains("already expanding"));
}

#[test]
fn per_action_records_carry_results_and_timing() {
    let log = EventLog::new();
    let exec = executor(recording_registry(&log, None), ExecOptions::default());
    let result = exec.execute_protocol(&protocol(json!({
        "version": "1.0",
        "metadata": {"description": "d"},
        "actions": [
            {"action": "mouse_position"},
            {"action": "get_clipboard"}
        ]
    })));
    assert_eq!(result.status, RunStatus::Success);
    let context = result.context.unwrap();
    assert_eq!(context.action_results.len(), 2);
    assert_eq!(context.action_results[0].action_name, "mouse_position");
    assert_eq!(
        context.action_results[0].result,
        Some(json!({"x": 7, "y": 9}))
    );
    assert_eq!(
        context.action_results[1].result,
        Some(json!({"text": ""}))
    );
}
