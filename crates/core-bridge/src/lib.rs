//! Boundary adapter: protocols in, execution reports out.
//!
//! Two transports share one code path. `run_document` is the in-process
//! call: decode, validate, execute, report. `serve` is the file-backed
//! queue for out-of-process callers: JSON documents dropped into an inbox
//! directory are picked up (via a `notify` watcher plus an initial scan),
//! executed, and answered with `<stem>.report.json` in the outbox.
//!
//! The adapter performs no semantic checks of its own: validation failures
//! come straight from the parser and produce a failure report without
//! executing anything. A malformed payload must never take the service
//! loop down.

use core_config::BridgeConfig;
use core_executor::Executor;
use core_parser::{ValidationResult, ValidatorHints, parse_str};
use core_protocol::ExecutionResult;
use core_registry::Registry;
use crossbeam_channel::RecvTimeoutError;
use notify::{RecursiveMode, Watcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct BridgeReport {
    /// Inbox file stem for queue transport; absent for in-process calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub validation: ValidationResult,
    /// Present iff validation passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
}

pub struct Bridge {
    registry: Arc<Registry>,
    executor: Arc<Executor>,
    hints: ValidatorHints,
}

impl Bridge {
    pub fn new(registry: Arc<Registry>, executor: Arc<Executor>, hints: ValidatorHints) -> Self {
        Self {
            registry,
            executor,
            hints,
        }
    }

    /// Decode and run one protocol document.
    pub fn run_document(&self, payload: &str) -> BridgeReport {
        let outcome = parse_str(payload, &self.registry, &self.hints);
        match outcome.protocol {
            Some(protocol) => {
                let execution = self.executor.execute_protocol(&protocol);
                BridgeReport {
                    source: None,
                    validation: outcome.report,
                    execution: Some(execution),
                }
            }
            None => {
                info!(
                    target: "bridge",
                    errors = outcome.report.errors.len(),
                    "document_rejected"
                );
                BridgeReport {
                    source: None,
                    validation: outcome.report,
                    execution: None,
                }
            }
        }
    }

    /// Watch `cfg.inbox` for protocol documents until `shutdown` is set.
    /// Blocks the calling thread.
    pub fn serve(&self, cfg: &BridgeConfig, shutdown: &AtomicBool) -> anyhow::Result<()> {
        std::fs::create_dir_all(&cfg.inbox)?;
        std::fs::create_dir_all(&cfg.outbox)?;

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&cfg.inbox, RecursiveMode::NonRecursive)?;
        info!(
            target: "bridge",
            inbox = %cfg.inbox.display(),
            outbox = %cfg.outbox.display(),
            "serve_start"
        );

        // Documents that were already waiting before the watcher existed.
        let mut backlog: Vec<PathBuf> = std::fs::read_dir(&cfg.inbox)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_protocol_file(p))
            .collect();
        backlog.sort();
        for path in backlog {
            self.process_file(&path, &cfg.outbox);
        }

        while !shutdown.load(Ordering::SeqCst) {
            match rx.recv_timeout(Duration::from_millis(cfg.poll_ms)) {
                Ok(Ok(event)) => {
                    if !matches!(
                        event.kind,
                        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                    ) {
                        continue;
                    }
                    for path in event.paths {
                        if is_protocol_file(&path) {
                            self.process_file(&path, &cfg.outbox);
                        }
                    }
                }
                Ok(Err(e)) => warn!(target: "bridge", error = %e, "watch_error"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(target: "bridge", "serve_stop");
        Ok(())
    }

    fn process_file(&self, path: &Path, outbox: &Path) {
        // Watcher events arrive more than once per file; whoever reads it
        // first removes it, later events find nothing.
        let payload = match std::fs::read_to_string(path) {
            Ok(payload) => payload,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(target: "bridge", file = %path.display(), error = %e, "inbox_read_failed");
                return;
            }
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "protocol".to_string());
        info!(target: "bridge", file = %path.display(), "document_received");

        let mut report = self.run_document(&payload);
        report.source = Some(stem.clone());

        let report_path = outbox.join(format!("{stem}.report.json"));
        match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                if let Err(e) = std::fs::write(&report_path, text) {
                    warn!(target: "bridge", file = %report_path.display(), error = %e, "report_write_failed");
                }
            }
            Err(e) => warn!(target: "bridge", error = %e, "report_encode_failed"),
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!(target: "bridge", file = %path.display(), error = %e, "inbox_remove_failed");
        }
    }
}

fn is_protocol_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_executor::ExecOptions;
    use core_input::AbortFlag;
    use core_registry::Backends;
    use std::sync::atomic::AtomicBool;

    /// Dry-run bridge: handlers are never invoked, so no backends needed.
    fn bridge() -> Bridge {
        let registry = Arc::new(Registry::with_builtins(Backends::default()));
        let executor = Arc::new(Executor::new(
            registry.clone(),
            ExecOptions {
                dry_run: true,
                default_wait_after_ms: 0,
            },
            AbortFlag::new(),
        ));
        Bridge::new(registry, executor, ValidatorHints::default())
    }

    const VALID: &str = r#"{
        "version": "1.0",
        "metadata": {"description": "bridge test"},
        "actions": [{"action": "press_key", "params": {"key": "enter"}}]
    }"#;

    #[test]
    fn valid_document_executes_and_reports() {
        let report = bridge().run_document(VALID);
        assert!(report.validation.is_valid);
        let execution = report.execution.expect("executed");
        assert!(execution.is_success());
        assert_eq!(execution.actions_completed, 1);
    }

    #[test]
    fn invalid_document_reports_without_executing() {
        let report = bridge().run_document(r#"{"version": "1.0"}"#);
        assert!(!report.validation.is_valid);
        assert!(report.execution.is_none());
        assert!(!report.validation.errors.is_empty());
    }

    #[test]
    fn garbage_payload_reports_without_panicking() {
        let report = bridge().run_document("][ not json");
        assert!(!report.validation.is_valid);
        assert!(report.execution.is_none());
    }

    #[test]
    fn serve_processes_backlog_and_live_drops() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BridgeConfig {
            inbox: dir.path().join("in"),
            outbox: dir.path().join("out"),
            poll_ms: 50,
        };
        std::fs::create_dir_all(&cfg.inbox).unwrap();
        // Backlog document, present before the watcher starts.
        std::fs::write(cfg.inbox.join("first.json"), VALID).unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let bridge = Arc::new(bridge());
        let serve_cfg = cfg.clone();
        let serve_flag = shutdown.clone();
        let serve_bridge = bridge.clone();
        let handle =
            std::thread::spawn(move || serve_bridge.serve(&serve_cfg, &serve_flag).unwrap());

        let first_report = cfg.outbox.join("first.report.json");
        wait_for(&first_report);

        // Live drop after the watcher is up.
        std::fs::write(cfg.inbox.join("second.json"), VALID).unwrap();
        let second_report = cfg.outbox.join("second.report.json");
        wait_for(&second_report);

        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&second_report).unwrap()).unwrap();
        assert_eq!(report["source"], serde_json::json!("second"));
        assert_eq!(report["validation"]["is_valid"], serde_json::json!(true));
        assert_eq!(report["execution"]["status"], serde_json::json!("success"));
        // Processed inputs are consumed.
        assert!(!cfg.inbox.join("first.json").exists());
        assert!(!cfg.inbox.join("second.json").exists());
    }

    fn wait_for(path: &Path) {
        for _ in 0..100 {
            if path.exists() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        panic!("timed out waiting for {}", path.display());
    }
}
