//! Edit actions, chord-driven against the focused editor.

use super::{chords, str_arg};
use core_input::KeyboardBackend;
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use serde_json::{Value, json};

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new("select_all", Category::Edit, "Select everything in the focused element."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::SELECT_ALL))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("undo", Category::Edit, "Undo the last edit."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::UNDO))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("redo", Category::Edit, "Redo the last undone edit."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::REDO))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "find_replace",
            Category::Edit,
            "Open the find-and-replace panel, optionally pre-typing the search term.",
        )
        .optional("find", ParamKind::String, json!("")),
        Box::new(|params, deps| {
            let term = str_arg(params, "find")?;
            let keyboard = deps.keyboard()?;
            keyboard.chord(&chords::chord(chords::FIND_REPLACE))?;
            if !term.is_empty() {
                keyboard.type_text(term, 0)?;
            }
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("delete_line", Category::Edit, "Delete the current line."),
        Box::new(|_params, deps| {
            let keyboard = deps.keyboard()?;
            keyboard.tap("home")?;
            keyboard.chord(&["shift".to_string(), "end".to_string()])?;
            keyboard.tap("delete")?;
            // Pull the next line up.
            keyboard.tap("delete")?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("duplicate_line", Category::Edit, "Duplicate the current line below itself."),
        Box::new(|_params, deps| {
            let keyboard = deps.keyboard()?;
            keyboard.tap("home")?;
            keyboard.chord(&["shift".to_string(), "end".to_string()])?;
            keyboard.chord(&chords::chord(chords::COPY))?;
            keyboard.tap("end")?;
            keyboard.tap("enter")?;
            keyboard.chord(&chords::chord(chords::PASTE))?;
            Ok(Value::Null)
        }),
    )?;

    Ok(())
}
