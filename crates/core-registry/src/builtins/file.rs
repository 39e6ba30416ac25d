//! File actions: dialog-driven for the focused application, direct
//! filesystem for folder/file management.

use super::{chords, str_arg};
use core_input::KeyboardBackend;
use crate::{ActionDef, Category, HandlerError, ParamKind, Registry, RegistryError};
use serde_json::{Value, json};
use std::time::Duration;

/// File dialogs need a beat to appear before we type into them.
const DIALOG_DELAY: Duration = Duration::from_millis(500);

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(
            "open_file",
            Category::File,
            "Open a file in the focused application via its open dialog.",
        )
        .required("path", ParamKind::String),
        Box::new(|params, deps| {
            let path = str_arg(params, "path")?;
            let keyboard = deps.keyboard()?;
            keyboard.chord(&chords::chord(chords::OPEN_FILE))?;
            std::thread::sleep(DIALOG_DELAY);
            keyboard.type_text(path, 0)?;
            keyboard.tap("enter")?;
            Ok(json!({"path": path}))
        }),
    )?;

    registry.register(
        ActionDef::new("save_file", Category::File, "Save the focused document."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::SAVE))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "save_as",
            Category::File,
            "Save the focused document under a new path via the save-as dialog.",
        )
        .required("path", ParamKind::String),
        Box::new(|params, deps| {
            let path = str_arg(params, "path")?;
            let keyboard = deps.keyboard()?;
            keyboard.chord(&chords::chord(chords::SAVE_AS))?;
            std::thread::sleep(DIALOG_DELAY);
            keyboard.type_text(path, 0)?;
            keyboard.tap("enter")?;
            Ok(json!({"path": path}))
        }),
    )?;

    registry.register(
        ActionDef::new("open_file_dialog", Category::File, "Open the file dialog and stop there."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::OPEN_FILE))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("create_folder", Category::File, "Create a directory (parents included).")
            .required("path", ParamKind::String),
        Box::new(|params, _deps| {
            let path = str_arg(params, "path")?;
            std::fs::create_dir_all(path).map_err(|e| HandlerError::other(e.to_string()))?;
            Ok(json!({"path": path}))
        }),
    )?;

    registry.register(
        ActionDef::new("delete_file", Category::File, "Delete a single file from disk.")
            .required("path", ParamKind::String),
        Box::new(|params, _deps| {
            let path = str_arg(params, "path")?;
            std::fs::remove_file(path).map_err(|e| HandlerError::other(e.to_string()))?;
            Ok(json!({"path": path}))
        }),
    )?;

    Ok(())
}
