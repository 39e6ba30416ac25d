//! Sequential protocol executor.
//!
//! One logical thread of control: actions run strictly in order, at most one
//! protocol at a time (a concurrent attempt fails with `Busy`). Before every
//! action the executor checks the stop flag, then blocks on the pause
//! condition variable until resumed or stopped. Macro actions are
//! intercepted here (the registry never sees them) and executed
//! re-entrantly under the same context with the expander's active stack
//! guarding against run-time cycles.
//!
//! Ordering guarantee: action *k+1* observes every side effect of action
//! *k*. That is why substitution happens per action, immediately before
//! dispatch: variables written by action *k* (verification coordinates in
//! particular) land in the substituted params of action *k+1*.
//!
//! A handler that reports `Aborted` ends the run with status `stopped`, not
//! `failed`: the operator pulled the plug mid-handler and the distinction
//! matters to whoever reads the report.

use chrono::Utc;
use core_expand::ActiveStack;
use core_input::AbortFlag;
use core_protocol::{
    ActionRecord, ActionSpec, ExecutionContext, ExecutionError, ExecutionResult, Protocol,
    RunStatus, VerificationResult,
};
use core_registry::Registry;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const VISION_ACTIONS: &[&str] = &["verify_screen", "verify_element", "find_element", "verify_text"];

/// Granularity of stop-flag checks inside interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    pub dry_run: bool,
    /// Applied when an action omits `wait_after_ms` entirely; an explicit 0
    /// stays 0.
    pub default_wait_after_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStatus {
    pub is_running: bool,
    pub is_paused: bool,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_action: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_actions: Option<usize>,
}

/// How a step ended early.
enum StepEnd {
    Stopped,
    Failed(ExecutionError),
}

struct RunInfo {
    protocol_id: String,
    total_actions: usize,
}

pub struct Executor {
    registry: Arc<Registry>,
    options: ExecOptions,
    abort: AbortFlag,
    running: AtomicBool,
    stop: AtomicBool,
    paused: Mutex<bool>,
    control: Condvar,
    context: Mutex<Option<ExecutionContext>>,
    run_info: Mutex<Option<RunInfo>>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>, options: ExecOptions, abort: AbortFlag) -> Self {
        Self {
            registry,
            options,
            abort,
            running: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            paused: Mutex::new(false),
            control: Condvar::new(),
            context: Mutex::new(None),
            run_info: Mutex::new(None),
        }
    }

    pub fn options(&self) -> ExecOptions {
        self.options
    }

    // ---------------------------------------------------------------------------------------------
    // Control surface (callable from any thread)
    // ---------------------------------------------------------------------------------------------

    pub fn pause_execution(&self) {
        *self.lock_paused() = true;
        info!(target: "exec", "pause_requested");
    }

    pub fn resume_execution(&self) {
        *self.lock_paused() = false;
        self.control.notify_all();
        info!(target: "exec", "resume_requested");
    }

    /// Idempotent. Effective between actions, during inter-action waits, and
    /// before the next synthetic input event via the shared abort flag.
    pub fn stop_execution(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.abort.trip();
        self.control.notify_all();
        info!(target: "exec", "stop_requested");
    }

    pub fn get_execution_status(&self) -> ExecutionStatus {
        let info = self.run_info.lock().unwrap_or_else(PoisonError::into_inner);
        let context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        ExecutionStatus {
            is_running: self.running.load(Ordering::SeqCst),
            is_paused: *self.lock_paused(),
            dry_run: self.options.dry_run,
            protocol_id: info.as_ref().map(|i| i.protocol_id.clone()),
            current_action: context.as_ref().map(|c| c.current_index),
            total_actions: info.as_ref().map(|i| i.total_actions),
        }
    }

    /// Snapshot of the live context; `None` outside a run (the context is
    /// discarded once the run ends, its final state lives in the result).
    pub fn get_context(&self) -> Option<ExecutionContext> {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ---------------------------------------------------------------------------------------------
    // The run
    // ---------------------------------------------------------------------------------------------

    pub fn execute_protocol(&self, protocol: &Protocol) -> ExecutionResult {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(target: "exec", "busy_rejected");
            return busy_result(protocol);
        }

        // Fresh run: clear the control flags a previous stop left behind.
        self.stop.store(false, Ordering::SeqCst);
        self.abort.clear();
        *self.lock_paused() = false;

        let protocol_id = format!("proto-{}", Utc::now().format("%Y%m%d%H%M%S%3f"));
        let total_actions = protocol.actions.len();
        info!(
            target: "exec",
            protocol_id = %protocol_id,
            total_actions,
            dry_run = self.options.dry_run,
            description = %protocol.metadata.description,
            "run_start"
        );

        *self.run_info.lock().unwrap_or_else(PoisonError::into_inner) = Some(RunInfo {
            protocol_id: protocol_id.clone(),
            total_actions,
        });
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(ExecutionContext::new(protocol_id));

        let started = Instant::now();
        let mut completed = 0usize;
        let mut status = RunStatus::Success;
        let mut failure: Option<ExecutionError> = None;
        let mut stack = ActiveStack::new();

        for (index, action) in protocol.actions.iter().enumerate() {
            match self.run_action(protocol, index, action, &mut stack, true, &mut completed) {
                Ok(()) => {}
                Err(StepEnd::Stopped) => {
                    status = RunStatus::Stopped;
                    break;
                }
                Err(StepEnd::Failed(error)) => {
                    status = RunStatus::Failed;
                    failure = Some(error);
                    break;
                }
            }
        }

        if status == RunStatus::Stopped && completed == total_actions {
            // The stop landed in the final inter-action wait; every action
            // ran, so the run is a success.
            status = RunStatus::Success;
        }

        let context = self
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        *self.run_info.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.running.store(false, Ordering::SeqCst);

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            target: "exec",
            status = ?status,
            completed,
            total_actions,
            duration_ms,
            "run_end"
        );
        ExecutionResult {
            status,
            actions_completed: completed,
            total_actions,
            duration_ms,
            error: failure.as_ref().map(|e| e.error_message.clone()),
            error_details: failure,
            context,
        }
    }

    /// Execute one action (or macro) under the shared context. `index` is
    /// the top-level action index, carried unchanged through macro
    /// recursion so failures always name the protocol-level step.
    fn run_action(
        &self,
        protocol: &Protocol,
        index: usize,
        action: &ActionSpec,
        stack: &mut ActiveStack,
        top_level: bool,
        completed: &mut usize,
    ) -> Result<(), StepEnd> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(StepEnd::Stopped);
        }
        self.wait_while_paused()?;

        let context_vars = {
            let mut guard = self.context.lock().unwrap_or_else(PoisonError::into_inner);
            let context = guard.as_mut().expect("context exists during run");
            context.current_index = index;
            context.variables.clone()
        };
        let no_vars = BTreeMap::new();
        let params = core_expand::substitute_params(&action.params, &no_vars, &context_vars);

        let started = Instant::now();
        if action.is_macro() {
            self.run_macro(protocol, index, action, &params, &context_vars, stack, started)?;
        } else {
            self.run_primitive(index, action, params, started)?;
        }

        if top_level {
            *completed += 1;
        }

        let wait = action.wait_after_ms.unwrap_or(self.options.default_wait_after_ms);
        if wait > 0 && self.sleep_interruptible(wait) {
            return Err(StepEnd::Stopped);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_macro(
        &self,
        protocol: &Protocol,
        index: usize,
        action: &ActionSpec,
        params: &Map<String, Value>,
        context_vars: &BTreeMap<String, Value>,
        stack: &mut ActiveStack,
        started: Instant,
    ) -> Result<(), StepEnd> {
        let name = match params.get("name").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => {
                return Err(self.fail(
                    index,
                    action,
                    params.clone(),
                    "MacroError",
                    "macro action has no resolvable `name`",
                    started,
                ));
            }
        };
        let vars: BTreeMap<String, Value> = params
            .get("vars")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        let expanded =
            match core_expand::expand_macro(&protocol.macros, &name, &vars, context_vars, stack) {
                Ok(actions) => actions,
                Err(e) => {
                    return Err(self.fail(
                        index,
                        action,
                        params.clone(),
                        "MacroError",
                        e.to_string(),
                        started,
                    ));
                }
            };

        debug!(target: "exec.macro", macro_name = %name, sub_actions = expanded.len(), "macro_enter");
        stack.push(name.clone());
        let mut outcome = Ok(());
        for sub in &expanded {
            outcome = self.run_action(protocol, index, sub, stack, false, &mut 0);
            if outcome.is_err() {
                break;
            }
        }
        stack.pop();
        outcome?;

        self.record(ActionRecord::success(
            action.name.clone(),
            json!({"macro": name, "sub_actions": expanded.len()}),
            started.elapsed().as_millis() as u64,
        ));
        Ok(())
    }

    fn run_primitive(
        &self,
        index: usize,
        action: &ActionSpec,
        params: Map<String, Value>,
        started: Instant,
    ) -> Result<(), StepEnd> {
        let result = if self.options.dry_run {
            Ok(dry_run_result(&action.name, &params))
        } else {
            self.registry.execute(&action.name, &params)
        };

        match result {
            Ok(value) => {
                self.record(ActionRecord::success(
                    action.name.clone(),
                    value.clone(),
                    started.elapsed().as_millis() as u64,
                ));
                if VISION_ACTIONS.contains(&action.name.as_str()) {
                    if let Ok(verification) =
                        serde_json::from_value::<VerificationResult>(value)
                    {
                        self.handle_verification(&action.name, &verification);
                    }
                }
                Ok(())
            }
            Err(e) if e.is_abort() => {
                self.record(ActionRecord::failure(
                    action.name.clone(),
                    e.to_string(),
                    started.elapsed().as_millis() as u64,
                ));
                Err(StepEnd::Stopped)
            }
            Err(e) => Err(self.fail(
                index,
                action,
                params,
                e.error_type(),
                e.to_string(),
                started,
            )),
        }
    }

    /// Mirror a verification verdict into context variables. A negative
    /// verdict does not halt the run; protocols branch on the variables in
    /// their next action instead.
    fn handle_verification(&self, action_name: &str, verification: &VerificationResult) {
        let mut guard = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        let context = guard.as_mut().expect("context exists during run");
        if let Some(point) = verification.updated_coordinates {
            context.set_variable("verified_x", json!(point.x));
            context.set_variable("verified_y", json!(point.y));
        }
        context.set_variable("last_verification_safe", json!(verification.safe_to_proceed));
        context.set_variable(
            "last_verification_confidence",
            json!(verification.confidence),
        );
        context.set_variable(
            "last_verification_analysis",
            json!(verification.analysis.clone()),
        );
        if let Some(suggested) = &verification.suggested_actions {
            context.set_variable("suggested_actions", json!(suggested.clone()));
        }
        if !verification.safe_to_proceed {
            warn!(
                target: "exec",
                action = action_name,
                confidence = verification.confidence,
                analysis = %verification.analysis,
                "verification_not_safe_continuing"
            );
        }
    }

    fn fail(
        &self,
        index: usize,
        action: &ActionSpec,
        params: Map<String, Value>,
        error_type: &str,
        message: impl Into<String>,
        started: Instant,
    ) -> StepEnd {
        let message = message.into();
        self.record(ActionRecord::failure(
            action.name.clone(),
            message.clone(),
            started.elapsed().as_millis() as u64,
        ));
        warn!(
            target: "exec",
            action = %action.name,
            index,
            error_type,
            message = %message,
            "action_failed"
        );
        StepEnd::Failed(ExecutionError {
            action_index: index,
            action_name: action.name.clone(),
            error_type: error_type.to_string(),
            error_message: message,
            timestamp: Utc::now(),
            params,
        })
    }

    fn record(&self, record: ActionRecord) {
        let mut guard = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(context) = guard.as_mut() {
            context.action_results.push(record);
        }
    }

    fn wait_while_paused(&self) -> Result<(), StepEnd> {
        let mut paused = self.lock_paused();
        while *paused {
            if self.stop.load(Ordering::SeqCst) {
                return Err(StepEnd::Stopped);
            }
            paused = self
                .control
                .wait_timeout(paused, SLEEP_SLICE)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }

    /// Returns true when the sleep was cut short by stop.
    fn sleep_interruptible(&self, ms: u64) -> bool {
        let deadline = Instant::now() + Duration::from_millis(ms);
        let mut guard = self.lock_paused();
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .control
                .wait_timeout(guard, SLEEP_SLICE.min(deadline - now))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock_paused(&self) -> std::sync::MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn dry_run_result(name: &str, params: &Map<String, Value>) -> Value {
    if VISION_ACTIONS.contains(&name) {
        // Dry-run verifications report a fixed safe verdict.
        serde_json::to_value(VerificationResult::dry_run()).expect("static shape serializes")
    } else {
        json!({"dry_run": true, "action": name, "params": params})
    }
}

fn busy_result(protocol: &Protocol) -> ExecutionResult {
    ExecutionResult {
        status: RunStatus::Failed,
        actions_completed: 0,
        total_actions: protocol.actions.len(),
        duration_ms: 0,
        error: Some("another protocol is already executing".to_string()),
        error_details: Some(ExecutionError {
            action_index: 0,
            action_name: String::new(),
            error_type: "Busy".to_string(),
            error_message: "another protocol is already executing".to_string(),
            timestamp: Utc::now(),
            params: Map::new(),
        }),
        context: None,
    }
}
