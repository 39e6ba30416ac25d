//! Browser actions, chord-driven against the focused browser window.

use super::{chords, i64_arg, str_arg};
use core_input::KeyboardBackend;
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use serde_json::{Value, json};

fn chord_action(
    registry: &mut Registry,
    name: &str,
    description: &str,
    keys: &'static [&'static str],
) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(name, Category::Browser, description),
        Box::new(move |_params, deps| {
            deps.keyboard()?.chord(&chords::chord(keys))?;
            Ok(Value::Null)
        }),
    )
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(
            "open_url",
            Category::Browser,
            "Focus the address bar, type a URL, and navigate to it.",
        )
        .required("url", ParamKind::String)
        .example(json!({"action": "open_url", "params": {"url": "https://example.com"}})),
        Box::new(|params, deps| {
            let url = str_arg(params, "url")?;
            let keyboard = deps.keyboard()?;
            keyboard.chord(&chords::chord(chords::ADDRESS_BAR))?;
            keyboard.type_text(url, 0)?;
            keyboard.tap("enter")?;
            Ok(json!({"url": url}))
        }),
    )?;

    chord_action(registry, "browser_back", "Navigate back.", chords::BACK)?;
    chord_action(registry, "browser_forward", "Navigate forward.", chords::FORWARD)?;
    chord_action(registry, "browser_refresh", "Reload the current page.", chords::REFRESH)?;
    chord_action(registry, "browser_new_tab", "Open a new tab.", chords::NEW_TAB)?;
    chord_action(registry, "browser_close_tab", "Close the current tab.", chords::CLOSE_TAB)?;
    chord_action(
        registry,
        "browser_address_bar",
        "Focus the address bar.",
        chords::ADDRESS_BAR,
    )?;
    chord_action(
        registry,
        "browser_bookmark",
        "Bookmark the current page.",
        chords::BOOKMARK,
    )?;

    registry.register(
        ActionDef::new(
            "browser_switch_tab",
            Category::Browser,
            "Switch tabs: index 1-8 jumps to that tab, 0 cycles to the next one.",
        )
        .optional("index", ParamKind::Int, json!(0)),
        Box::new(|params, deps| {
            let index = i64_arg(params, "index")?;
            let keyboard = deps.keyboard()?;
            if (1..=8).contains(&index) {
                keyboard.chord(&vec!["ctrl".to_string(), index.to_string()])?;
            } else {
                keyboard.chord(&chords::chord(chords::NEXT_TAB))?;
            }
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("browser_find", Category::Browser, "Open in-page find, optionally typing a query.")
            .optional("text", ParamKind::String, json!("")),
        Box::new(|params, deps| {
            let text = str_arg(params, "text")?;
            let keyboard = deps.keyboard()?;
            keyboard.chord(&chords::chord(chords::FIND))?;
            if !text.is_empty() {
                keyboard.type_text(text, 0)?;
            }
            Ok(Value::Null)
        }),
    )?;

    Ok(())
}
