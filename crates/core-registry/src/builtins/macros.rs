//! The `macro` catalog entry.
//!
//! Registered so validation and documentation cover it, but the handler
//! refuses to run: the executor intercepts `macro` actions and drives the
//! expander before the registry is ever consulted. Reaching this handler
//! means something dispatched a macro action directly.

use crate::{ActionDef, Category, HandlerError, ParamKind, Registry, RegistryError};
use serde_json::json;

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(
            "macro",
            Category::Macro,
            "Invoke a named macro defined in the protocol, with optional variables.",
        )
        .required("name", ParamKind::String)
        .optional("vars", ParamKind::Map, json!({}))
        .example(json!({
            "action": "macro",
            "params": {"name": "search", "vars": {"q": "weather today"}}
        })),
        Box::new(|_params, _deps| {
            Err(HandlerError::other(
                "macro actions are expanded by the executor, not dispatched to the registry",
            ))
        }),
    )?;
    Ok(())
}
