//! Window management actions.
//!
//! All chord-driven: the engine has no window-server connection, it drives
//! whatever the desktop binds to the conventional shortcuts. `open_app`
//! goes through the OS launcher (meta / cmd+space), which is also how the
//! original operator flow worked.

use super::{chords, str_arg};
use core_input::KeyboardBackend;
use core_screen::CaptureBackend;
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use serde_json::{Value, json};
use std::time::Duration;

/// The launcher needs a beat to open and to filter results.
const LAUNCHER_DELAY: Duration = Duration::from_millis(600);

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(
            "open_app",
            Category::Window,
            "Launch an application by name via the OS launcher.",
        )
        .required("app_name", ParamKind::String)
        .example(json!({"action": "open_app", "params": {"app_name": "firefox"}})),
        Box::new(|params, deps| {
            let name = str_arg(params, "app_name")?;
            let keyboard = deps.keyboard()?;
            keyboard.chord(&chords::chord(chords::APP_LAUNCHER))?;
            std::thread::sleep(LAUNCHER_DELAY);
            keyboard.type_text(name, 20)?;
            std::thread::sleep(LAUNCHER_DELAY);
            keyboard.tap("enter")?;
            Ok(json!({"app_name": name}))
        }),
    )?;

    registry.register(
        ActionDef::new("close_app", Category::Window, "Close the focused application."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::CLOSE_APP))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("switch_window", Category::Window, "Cycle to the next window."),
        Box::new(|_params, deps| {
            deps.keyboard()?
                .chord(&chords::chord(chords::SWITCH_WINDOW))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("minimize_window", Category::Window, "Minimize the focused window."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::MINIMIZE))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("maximize_window", Category::Window, "Maximize the focused window."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::MAXIMIZE))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "restore_window",
            Category::Window,
            "Restore the focused window from its maximized state.",
        ),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::MINIMIZE))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("get_active_window", Category::Window, "Report the focused window title.")
            .returns("{title: string | null}"),
        Box::new(|_params, deps| {
            let title = deps.screen()?.active_window_title()?;
            Ok(json!({"title": title}))
        }),
    )?;

    Ok(())
}
