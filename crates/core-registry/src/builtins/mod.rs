//! The builtin action surface, grouped by category.
//!
//! Each module registers its actions with typed contracts and handlers that
//! only talk to the injected backends. Handlers read the merged/coerced
//! param map the registry produced, so the accessors here treat a missing
//! or mistyped key as an internal fault rather than user error.

use crate::{HandlerError, Registry, RegistryError};
use serde_json::{Map, Value};

mod browser;
mod chords;
mod clipboard;
mod edit;
mod file;
mod keyboard;
mod macros;
mod mouse;
mod screen;
mod system;
mod timing;
mod vision;
mod window;

/// Register the full builtin catalog. Fails only on a duplicate name,
/// which would be a programming error in this module tree.
pub fn install_builtins(registry: &mut Registry) -> Result<(), RegistryError> {
    keyboard::register(registry)?;
    mouse::register(registry)?;
    window::register(registry)?;
    browser::register(registry)?;
    clipboard::register(registry)?;
    file::register(registry)?;
    screen::register(registry)?;
    timing::register(registry)?;
    vision::register(registry)?;
    system::register(registry)?;
    edit::register(registry)?;
    macros::register(registry)?;
    Ok(())
}

// -------------------------------------------------------------------------------------------------
// Post-validation param accessors
// -------------------------------------------------------------------------------------------------

fn internal(name: &str) -> HandlerError {
    HandlerError::other(format!("param `{name}` absent after validation"))
}

pub(crate) fn str_arg<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a str, HandlerError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| internal(name))
}

pub(crate) fn i64_arg(params: &Map<String, Value>, name: &str) -> Result<i64, HandlerError> {
    params
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| internal(name))
}

pub(crate) fn i32_arg(params: &Map<String, Value>, name: &str) -> Result<i32, HandlerError> {
    Ok(i64_arg(params, name)? as i32)
}

pub(crate) fn u32_arg(params: &Map<String, Value>, name: &str) -> Result<u32, HandlerError> {
    let v = i64_arg(params, name)?;
    u32::try_from(v).map_err(|_| HandlerError::other(format!("param `{name}` must be >= 0, got {v}")))
}

pub(crate) fn u64_arg(params: &Map<String, Value>, name: &str) -> Result<u64, HandlerError> {
    let v = i64_arg(params, name)?;
    u64::try_from(v).map_err(|_| HandlerError::other(format!("param `{name}` must be >= 0, got {v}")))
}

pub(crate) fn f64_arg(params: &Map<String, Value>, name: &str) -> Result<f64, HandlerError> {
    params
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| internal(name))
}

pub(crate) fn bool_arg(params: &Map<String, Value>, name: &str) -> Result<bool, HandlerError> {
    params
        .get(name)
        .and_then(Value::as_bool)
        .ok_or_else(|| internal(name))
}

pub(crate) fn string_list_arg(
    params: &Map<String, Value>,
    name: &str,
) -> Result<Vec<String>, HandlerError> {
    let items = params
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| internal(name))?;
    items
        .iter()
        .map(|v| {
            v.as_str().map(str::to_string).ok_or_else(|| {
                HandlerError::other(format!("param `{name}` must be a list of strings"))
            })
        })
        .collect()
}

/// Optional `[x, y, width, height]` region used by capture and vision
/// actions. An empty list means "full screen".
pub(crate) fn region_arg(
    params: &Map<String, Value>,
    name: &str,
) -> Result<Option<(u32, u32, u32, u32)>, HandlerError> {
    let Some(value) = params.get(name) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| HandlerError::other(format!("param `{name}` must be a list")))?;
    if items.is_empty() {
        return Ok(None);
    }
    if items.len() != 4 {
        return Err(HandlerError::other(format!(
            "param `{name}` must be [x, y, width, height]"
        )));
    }
    let mut parts = [0u32; 4];
    for (slot, item) in parts.iter_mut().zip(items) {
        let n = match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| HandlerError::other(format!("param `{name}` holds a non-integer")))?;
        *slot = u32::try_from(n)
            .map_err(|_| HandlerError::other(format!("param `{name}` holds a negative value")))?;
    }
    Ok(Some((parts[0], parts[1], parts[2], parts[3])))
}
