//! Marionette entrypoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_bridge::Bridge;
use core_executor::{ExecOptions, Executor};
use core_input::{AbortFlag, EnigoKeyboard, EnigoPointer, SystemClipboard};
use core_parser::ValidatorHints;
use core_registry::{Backends, Category, Registry};
use core_screen::{CaptureBackend, XcapCapture};
use core_vision::Verifier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Pointer drift beyond this many pixels from the last commanded position
/// counts as the operator grabbing the mouse.
const WATCHDOG_GRAB_PX: i64 = 80;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "marionette", version, about = "Desktop automation protocol engine")]
struct Args {
    /// Optional configuration file path (overrides discovery of `marionette.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and execute a protocol document, printing the report.
    Run {
        protocol: PathBuf,
        /// Execute without touching any backend.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a protocol document without executing it.
    Check { protocol: PathBuf },
    /// Print the action library (markdown; `--ai` for the machine catalog).
    Actions {
        #[arg(long)]
        ai: bool,
        /// Restrict to one category (keyboard, mouse, window, ...).
        #[arg(long)]
        category: Option<String>,
    },
    /// Watch the configured inbox directory for protocol documents.
    Serve,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self, dir: &Path) -> Result<()> {
        let log_path = dir.join("marionette.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(dir, "marionette.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so
                // the writer shuts down.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = core_config::load_from(args.config.clone())?;

    let mut startup = AppStartup::new();
    startup.configure_logging(&config.log.dir)?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", config_override = args.config.is_some(), "startup");

    match args.command {
        Command::Actions { ai, category } => cmd_actions(ai, category.as_deref()),
        Command::Check { protocol } => cmd_check(&protocol, &mut config),
        Command::Run { protocol, dry_run } => cmd_run(&protocol, dry_run, &mut config),
        Command::Serve => cmd_serve(&mut config),
    }
}

fn cmd_actions(ai: bool, category: Option<&str>) -> Result<()> {
    let category = match category {
        Some(name) => Some(Category::parse(name).with_context(|| {
            format!(
                "unknown category `{name}`; expected one of {}",
                Category::ALL
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?),
        None => None,
    };
    let registry = Registry::with_builtins(Backends::default());
    if ai {
        println!(
            "{}",
            serde_json::to_string_pretty(&registry.action_library_for_ai())?
        );
    } else {
        print!("{}", registry.generate_documentation(category));
    }
    Ok(())
}

fn cmd_check(protocol: &Path, config: &mut core_config::Config) -> Result<()> {
    let payload = std::fs::read_to_string(protocol)
        .with_context(|| format!("reading {}", protocol.display()))?;
    let registry = Registry::with_builtins(Backends::default());
    let hints = probe_hints(config, None);
    let outcome = core_parser::parse_str(&payload, &registry, &hints);
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    if !outcome.report.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_run(protocol: &Path, dry_run: bool, config: &mut core_config::Config) -> Result<()> {
    let payload = std::fs::read_to_string(protocol)
        .with_context(|| format!("reading {}", protocol.display()))?;

    let options = ExecOptions {
        dry_run: dry_run || config.executor.dry_run,
        default_wait_after_ms: config.executor.default_wait_after_ms,
    };
    let engine = Engine::bring_up(options, config)?;

    let stopper = engine.executor.clone();
    ctrlc::set_handler(move || {
        warn!(target: "runtime", "ctrl_c_stop");
        stopper.stop_execution();
    })
    .context("installing Ctrl-C handler")?;

    let report = engine.bridge().run_document(&payload);
    println!("{}", serde_json::to_string_pretty(&report)?);

    let code = match &report.execution {
        None => 1, // rejected by the validator
        Some(result) => match result.status {
            core_protocol::RunStatus::Success => 0,
            core_protocol::RunStatus::Stopped => 3,
            _ => 2,
        },
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn cmd_serve(config: &mut core_config::Config) -> Result<()> {
    let options = ExecOptions {
        dry_run: config.executor.dry_run,
        default_wait_after_ms: config.executor.default_wait_after_ms,
    };
    let engine = Engine::bring_up(options, config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let stopper = engine.executor.clone();
    ctrlc::set_handler(move || {
        warn!(target: "runtime", "ctrl_c_shutdown");
        flag.store(true, Ordering::SeqCst);
        stopper.stop_execution();
    })
    .context("installing Ctrl-C handler")?;

    engine.bridge().serve(&config.bridge, &shutdown)
}

/// Wired-up engine: registry with live (or absent, under dry-run) backends,
/// executor, validator hints.
struct Engine {
    registry: Arc<Registry>,
    executor: Arc<Executor>,
    hints: ValidatorHints,
}

impl Engine {
    fn bring_up(options: ExecOptions, config: &mut core_config::Config) -> Result<Self> {
        let abort = AbortFlag::new();
        // The fail-safe toggle detaches the backends from the stop path
        // without changing anything else.
        let backend_abort = if config.safety.enable_abort_flag {
            abort.clone()
        } else {
            AbortFlag::new()
        };

        let mut pointer_probe: Option<Arc<EnigoPointer>> = None;
        let backends = if options.dry_run {
            // Dry-run never touches a backend; skip device bring-up so it
            // also works headless.
            Backends {
                abort: backend_abort,
                ..Backends::default()
            }
        } else {
            let keyboard = EnigoKeyboard::new(backend_abort.clone())
                .context("keyboard backend bring-up")?;
            let pointer = Arc::new(
                EnigoPointer::new(backend_abort.clone()).context("pointer backend bring-up")?,
            );
            pointer_probe = Some(pointer.clone());
            let clipboard = match SystemClipboard::new() {
                Ok(clipboard) => {
                    Some(Arc::new(clipboard) as Arc<dyn core_input::ClipboardBackend>)
                }
                Err(e) => {
                    warn!(target: "runtime", error = %e, "clipboard_unavailable");
                    None
                }
            };
            Backends {
                keyboard: Some(Arc::new(keyboard)),
                pointer: Some(pointer),
                clipboard,
                screen: Some(Arc::new(XcapCapture::new())),
                vision: Some(Arc::new(Verifier::from_config(config.vision.clone()))),
                abort: backend_abort,
            }
        };

        let probed = backends
            .screen
            .as_ref()
            .and_then(|s| s.dimensions().ok());
        let hints = probe_hints(config, probed);

        let registry = Arc::new(Registry::with_builtins(backends));
        let executor = Arc::new(Executor::new(registry.clone(), options, abort.clone()));

        if config.safety.interrupt_on_user_mouse_move {
            if let Some(pointer) = pointer_probe {
                spawn_mouse_watchdog(pointer, executor.clone());
            }
        }

        Ok(Self {
            registry,
            executor,
            hints,
        })
    }

    fn bridge(&self) -> Bridge {
        Bridge::new(self.registry.clone(), self.executor.clone(), self.hints)
    }
}

fn probe_hints(config: &mut core_config::Config, probed: Option<(u32, u32)>) -> ValidatorHints {
    let probed = probed.or_else(|| XcapCapture::new().dimensions().ok());
    let (width, height) = config.apply_probed_dimensions(probed);
    ValidatorHints {
        screen_width: width,
        screen_height: height,
    }
}

/// Trip the stop path when the live pointer strays from where the engine
/// last put it, which means the operator has grabbed the mouse.
fn spawn_mouse_watchdog(pointer: Arc<EnigoPointer>, executor: Arc<Executor>) {
    std::thread::spawn(move || {
        use core_input::PointerBackend;
        loop {
            std::thread::sleep(Duration::from_millis(100));
            if !executor.get_execution_status().is_running {
                continue;
            }
            let (Some((cx, cy)), Ok((lx, ly))) = (pointer.last_commanded(), pointer.position())
            else {
                continue;
            };
            let (dx, dy) = ((lx - cx) as i64, (ly - cy) as i64);
            if dx * dx + dy * dy > WATCHDOG_GRAB_PX * WATCHDOG_GRAB_PX {
                warn!(
                    target: "runtime",
                    commanded_x = cx,
                    commanded_y = cy,
                    live_x = lx,
                    live_y = ly,
                    "user_mouse_move_interrupt"
                );
                executor.stop_execution();
            }
        }
    });
}
