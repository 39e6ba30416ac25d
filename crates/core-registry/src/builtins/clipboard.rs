//! Clipboard actions.

use super::{chords, str_arg};
use core_input::{ClipboardBackend, KeyboardBackend};
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use serde_json::{Value, json};

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new("copy", Category::Clipboard, "Copy the current selection."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::COPY))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("paste", Category::Clipboard, "Paste the clipboard contents."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::PASTE))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("cut", Category::Clipboard, "Cut the current selection."),
        Box::new(|_params, deps| {
            deps.keyboard()?.chord(&chords::chord(chords::CUT))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("get_clipboard", Category::Clipboard, "Read the clipboard text.")
            .returns("{text: string}"),
        Box::new(|_params, deps| {
            let text = deps.clipboard()?.get_text()?;
            Ok(json!({"text": text}))
        }),
    )?;

    registry.register(
        ActionDef::new("set_clipboard", Category::Clipboard, "Replace the clipboard text.")
            .required("text", ParamKind::String),
        Box::new(|params, deps| {
            deps.clipboard()?.set_text(str_arg(params, "text")?)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "paste_from_clipboard",
            Category::Clipboard,
            "Set the clipboard to the given text and paste it; the fast path for long text.",
        )
        .required("text", ParamKind::String),
        Box::new(|params, deps| {
            let text = str_arg(params, "text")?;
            deps.clipboard()?.set_text(text)?;
            deps.keyboard()?.chord(&chords::chord(chords::PASTE))?;
            Ok(json!({"chars": text.chars().count()}))
        }),
    )?;

    Ok(())
}
