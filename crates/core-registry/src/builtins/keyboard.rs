//! Keyboard actions.

use super::{str_arg, string_list_arg, u64_arg};
use core_input::{ClipboardBackend, KeyboardBackend};
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use serde_json::{Value, json};

/// Above this size, `type` switches to the clipboard paste path when both
/// backends are present: per-character synthesis of multi-kilobyte strings
/// takes long enough for the host UI to steal focus mid-entry.
const PASTE_THRESHOLD: usize = 200;

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new("press_key", Category::Keyboard, "Press and release a single key.")
            .required("key", ParamKind::String)
            .example(json!({"action": "press_key", "params": {"key": "enter"}})),
        Box::new(|params, deps| {
            deps.keyboard()?.tap(str_arg(params, "key")?)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "shortcut",
            Category::Keyboard,
            "Press a key combination; modifiers go down first and are released in reverse.",
        )
        .required("keys", ParamKind::List)
        .example(json!({"action": "shortcut", "params": {"keys": ["ctrl", "shift", "t"]}})),
        Box::new(|params, deps| {
            deps.keyboard()?.chord(&string_list_arg(params, "keys")?)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("type", Category::Keyboard, "Type text into the focused element.")
            .required("text", ParamKind::String)
            .optional("interval_ms", ParamKind::Int, json!(0))
            .example(json!({"action": "type", "params": {"text": "hello world"}})),
        Box::new(|params, deps| {
            let text = str_arg(params, "text")?;
            let interval = u64_arg(params, "interval_ms")?;
            let keyboard = deps.keyboard()?;
            if interval == 0 && text.len() > PASTE_THRESHOLD {
                if let Ok(clipboard) = deps.clipboard() {
                    clipboard.set_text(text)?;
                    keyboard.chord(&super::chords::chord(super::chords::PASTE))?;
                    return Ok(json!({"chars": text.chars().count(), "via": "clipboard"}));
                }
            }
            keyboard.type_text(text, interval)?;
            Ok(json!({"chars": text.chars().count()}))
        }),
    )?;

    registry.register(
        ActionDef::new(
            "type_with_delay",
            Category::Keyboard,
            "Type text with a per-character delay, for inputs that debounce keystrokes.",
        )
        .required("text", ParamKind::String)
        .optional("interval_ms", ParamKind::Int, json!(50)),
        Box::new(|params, deps| {
            let text = str_arg(params, "text")?;
            deps.keyboard()?
                .type_text(text, u64_arg(params, "interval_ms")?)?;
            Ok(json!({"chars": text.chars().count()}))
        }),
    )?;

    registry.register(
        ActionDef::new("hold_key", Category::Keyboard, "Press a key without releasing it.")
            .required("key", ParamKind::String),
        Box::new(|params, deps| {
            deps.keyboard()?.hold(str_arg(params, "key")?)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("release_key", Category::Keyboard, "Release a previously held key.")
            .required("key", ParamKind::String),
        Box::new(|params, deps| {
            deps.keyboard()?.release(str_arg(params, "key")?)?;
            Ok(Value::Null)
        }),
    )?;

    Ok(())
}
