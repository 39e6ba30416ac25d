//! System actions: session lock, power transitions, volume.
//!
//! Power and volume go through platform commands rather than synthetic
//! input, since there is no portable key chord for "suspend". Windows volume is
//! the exception: it has proper virtual keys and no stock CLI, so it rides
//! the keyboard backend.

use super::chords;
use core_input::KeyboardBackend;
use crate::{ActionDef, Backends, Category, HandlerError, Registry, RegistryError};
use serde_json::{Value, json};
use std::process::Command;
use tracing::warn;

fn run_command(deps: &Backends, program: &str, args: &[&str]) -> Result<Value, HandlerError> {
    deps.abort.check().map_err(HandlerError::from)?;
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| HandlerError::other(format!("{program} failed to start: {e}")))?;
    if !status.success() {
        warn!(target: "registry", program, ?status, "system_command_nonzero");
        return Err(HandlerError::other(format!(
            "{program} exited with {status}"
        )));
    }
    Ok(json!({"command": program}))
}

#[cfg(target_os = "linux")]
mod platform {
    use super::*;

    pub fn sleep(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "systemctl", &["suspend"])
    }
    pub fn shutdown(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "systemctl", &["poweroff"])
    }
    pub fn restart(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "systemctl", &["reboot"])
    }
    pub fn volume(deps: &Backends, delta: &str) -> Result<Value, HandlerError> {
        run_command(deps, "pactl", &["set-sink-volume", "@DEFAULT_SINK@", delta])
    }
    pub fn mute(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "pactl", &["set-sink-mute", "@DEFAULT_SINK@", "toggle"])
    }
    pub fn volume_up(deps: &Backends) -> Result<Value, HandlerError> {
        volume(deps, "+5%")
    }
    pub fn volume_down(deps: &Backends) -> Result<Value, HandlerError> {
        volume(deps, "-5%")
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::*;

    pub fn sleep(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "pmset", &["sleepnow"])
    }
    pub fn shutdown(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(
            deps,
            "osascript",
            &["-e", "tell application \"System Events\" to shut down"],
        )
    }
    pub fn restart(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(
            deps,
            "osascript",
            &["-e", "tell application \"System Events\" to restart"],
        )
    }
    pub fn volume_up(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(
            deps,
            "osascript",
            &["-e", "set volume output volume ((output volume of (get volume settings)) + 6)"],
        )
    }
    pub fn volume_down(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(
            deps,
            "osascript",
            &["-e", "set volume output volume ((output volume of (get volume settings)) - 6)"],
        )
    }
    pub fn mute(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "osascript", &["-e", "set volume with output muted"])
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::*;

    pub fn sleep(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(
            deps,
            "rundll32.exe",
            &["powrprof.dll,SetSuspendState", "0,1,0"],
        )
    }
    pub fn shutdown(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "shutdown", &["/s", "/t", "0"])
    }
    pub fn restart(deps: &Backends) -> Result<Value, HandlerError> {
        run_command(deps, "shutdown", &["/r", "/t", "0"])
    }
    pub fn volume_up(deps: &Backends) -> Result<Value, HandlerError> {
        deps.keyboard()?.tap("volumeup")?;
        Ok(Value::Null)
    }
    pub fn volume_down(deps: &Backends) -> Result<Value, HandlerError> {
        deps.keyboard()?.tap("volumedown")?;
        Ok(Value::Null)
    }
    pub fn mute(deps: &Backends) -> Result<Value, HandlerError> {
        deps.keyboard()?.tap("volumemute")?;
        Ok(Value::Null)
    }
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new("lock_screen", Category::System, "Lock the session."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::LOCK))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("sleep_system", Category::System, "Suspend the machine."),
        Box::new(|_params, deps| platform::sleep(deps)),
    )?;

    registry.register(
        ActionDef::new("shutdown_system", Category::System, "Power the machine off."),
        Box::new(|_params, deps| platform::shutdown(deps)),
    )?;

    registry.register(
        ActionDef::new("restart_system", Category::System, "Reboot the machine."),
        Box::new(|_params, deps| platform::restart(deps)),
    )?;

    registry.register(
        ActionDef::new("volume_up", Category::System, "Raise the output volume one step."),
        Box::new(|_params, deps| platform::volume_up(deps)),
    )?;

    registry.register(
        ActionDef::new("volume_down", Category::System, "Lower the output volume one step."),
        Box::new(|_params, deps| platform::volume_down(deps)),
    )?;

    registry.register(
        ActionDef::new("volume_mute", Category::System, "Toggle output mute."),
        Box::new(|_params, deps| platform::mute(deps)),
    )?;

    Ok(())
}
