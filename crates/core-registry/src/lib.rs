//! Action registry: the closed catalog of primitives a protocol may use.
//!
//! Every action name maps to an [`ActionEntry`]: category, description,
//! typed parameter contract (required params, optional params with
//! defaults), optional declared return shape, example calls, and the
//! handler itself. The registry validates and coerces parameters before a
//! handler ever runs, merges optional defaults in, and wraps handler
//! failures with their original kind and message. It performs no
//! scheduling, timing, or logging beyond that wrapping.
//!
//! Handlers reach the host exclusively through the injected [`Backends`]
//! trait objects, which is what makes the dry-run tripwire test and mock
//! backends possible.

use core_input::{AbortFlag, ClipboardBackend, InputError, KeyboardBackend, PointerBackend};
use core_screen::{CaptureBackend, ScreenError};
use core_vision::{Verifier, VisionError};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

mod builtins;

pub use builtins::install_builtins;

// -------------------------------------------------------------------------------------------------
// Parameter contracts
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Int,
    Float,
    Bool,
    List,
    Map,
    Any,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::List => "list",
            ParamKind::Map => "map",
            ParamKind::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptionalParam {
    pub spec: ParamSpec,
    pub default: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    Keyboard,
    Mouse,
    Window,
    Browser,
    Clipboard,
    File,
    Screen,
    Timing,
    Vision,
    System,
    Edit,
    Macro,
}

impl Category {
    pub const ALL: &[Category] = &[
        Category::Keyboard,
        Category::Mouse,
        Category::Window,
        Category::Browser,
        Category::Clipboard,
        Category::File,
        Category::Screen,
        Category::Timing,
        Category::Vision,
        Category::System,
        Category::Edit,
        Category::Macro,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.to_string() == name.to_ascii_lowercase())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Keyboard => "keyboard",
            Category::Mouse => "mouse",
            Category::Window => "window",
            Category::Browser => "browser",
            Category::Clipboard => "clipboard",
            Category::File => "file",
            Category::Screen => "screen",
            Category::Timing => "timing",
            Category::Vision => "vision",
            Category::System => "system",
            Category::Edit => "edit",
            Category::Macro => "macro",
        };
        f.write_str(name)
    }
}

// -------------------------------------------------------------------------------------------------
// Errors
// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerErrorKind {
    /// The abort flag fired mid-handler.
    Aborted,
    /// A `wait_for_*` deadline expired.
    Timeout,
    /// The handler needed a backend that was not injected.
    Unavailable,
    /// Anything else the handler raised.
    Handler,
}

impl HandlerErrorKind {
    pub fn error_type(self) -> &'static str {
        match self {
            HandlerErrorKind::Aborted => "Aborted",
            HandlerErrorKind::Timeout => "Timeout",
            HandlerErrorKind::Unavailable => "BackendUnavailable",
            HandlerErrorKind::Handler => "HandlerError",
        }
    }
}

/// Failure raised inside a handler, preserving the original kind so the
/// executor can tell an operator stop from a real fault.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: HandlerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::Handler, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(HandlerErrorKind::Timeout, message)
    }

    pub fn unavailable(backend: &str) -> Self {
        Self::new(
            HandlerErrorKind::Unavailable,
            format!("{backend} backend not injected"),
        )
    }
}

impl From<InputError> for HandlerError {
    fn from(e: InputError) -> Self {
        match e {
            InputError::Aborted => Self::new(HandlerErrorKind::Aborted, e.to_string()),
            other => Self::other(other.to_string()),
        }
    }
}

impl From<ScreenError> for HandlerError {
    fn from(e: ScreenError) -> Self {
        Self::other(e.to_string())
    }
}

impl From<VisionError> for HandlerError {
    fn from(e: VisionError) -> Self {
        Self::other(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("action `{0}` is already registered")]
    Duplicate(String),
    #[error("action `{action}` is missing required param `{param}`")]
    MissingParam { action: String, param: String },
    #[error("action `{action}` got unknown param `{param}`")]
    UnknownParam { action: String, param: String },
    #[error("action `{action}` param `{param}` expects {expected}, got {got}")]
    ParamType {
        action: String,
        param: String,
        expected: ParamKind,
        got: String,
    },
    #[error("action `{action}` failed: {message}")]
    Handler {
        action: String,
        kind: HandlerErrorKind,
        message: String,
    },
}

impl RegistryError {
    /// Stable taxonomy string carried into `ExecutionError.error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            RegistryError::UnknownAction(_) => "UnknownAction",
            RegistryError::Duplicate(_) => "DuplicateAction",
            RegistryError::MissingParam { .. } => "MissingParam",
            RegistryError::UnknownParam { .. } => "UnknownParam",
            RegistryError::ParamType { .. } => "ParamTypeError",
            RegistryError::Handler { kind, .. } => kind.error_type(),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            RegistryError::Handler {
                kind: HandlerErrorKind::Aborted,
                ..
            }
        )
    }
}

// -------------------------------------------------------------------------------------------------
// Injected backends
// -------------------------------------------------------------------------------------------------

/// Backend references handlers consult at call time. All optional: a
/// registry used only for validation or documentation needs none of them,
/// and each handler fails with `BackendUnavailable` when its dependency is
/// missing.
#[derive(Clone, Default)]
pub struct Backends {
    pub keyboard: Option<Arc<dyn KeyboardBackend>>,
    pub pointer: Option<Arc<dyn PointerBackend>>,
    pub clipboard: Option<Arc<dyn ClipboardBackend>>,
    pub screen: Option<Arc<dyn CaptureBackend>>,
    pub vision: Option<Arc<Verifier>>,
    pub abort: AbortFlag,
}

impl Backends {
    pub fn keyboard(&self) -> Result<&Arc<dyn KeyboardBackend>, HandlerError> {
        self.keyboard
            .as_ref()
            .ok_or_else(|| HandlerError::unavailable("keyboard"))
    }

    pub fn pointer(&self) -> Result<&Arc<dyn PointerBackend>, HandlerError> {
        self.pointer
            .as_ref()
            .ok_or_else(|| HandlerError::unavailable("pointer"))
    }

    pub fn clipboard(&self) -> Result<&Arc<dyn ClipboardBackend>, HandlerError> {
        self.clipboard
            .as_ref()
            .ok_or_else(|| HandlerError::unavailable("clipboard"))
    }

    pub fn screen(&self) -> Result<&Arc<dyn CaptureBackend>, HandlerError> {
        self.screen
            .as_ref()
            .ok_or_else(|| HandlerError::unavailable("screen"))
    }

    pub fn vision(&self) -> Result<&Arc<Verifier>, HandlerError> {
        self.vision
            .as_ref()
            .ok_or_else(|| HandlerError::unavailable("vision"))
    }
}

// -------------------------------------------------------------------------------------------------
// Registry
// -------------------------------------------------------------------------------------------------

pub type HandlerResult = Result<Value, HandlerError>;
pub type Handler = Box<dyn Fn(&Map<String, Value>, &Backends) -> HandlerResult + Send + Sync>;

/// Data half of a registration; the handler is passed alongside it in
/// [`Registry::register`].
#[derive(Debug, Clone)]
pub struct ActionDef {
    pub name: String,
    pub category: Category,
    pub description: String,
    pub required: Vec<ParamSpec>,
    pub optional: Vec<OptionalParam>,
    pub returns: Option<String>,
    pub examples: Vec<Value>,
}

impl ActionDef {
    pub fn new(name: &str, category: Category, description: &str) -> Self {
        Self {
            name: name.to_string(),
            category,
            description: description.to_string(),
            required: Vec::new(),
            optional: Vec::new(),
            returns: None,
            examples: Vec::new(),
        }
    }

    pub fn required(mut self, name: &str, kind: ParamKind) -> Self {
        self.required.push(ParamSpec::new(name, kind));
        self
    }

    pub fn optional(mut self, name: &str, kind: ParamKind, default: Value) -> Self {
        self.optional.push(OptionalParam {
            spec: ParamSpec::new(name, kind),
            default,
        });
        self
    }

    pub fn returns(mut self, shape: &str) -> Self {
        self.returns = Some(shape.to_string());
        self
    }

    pub fn example(mut self, example: Value) -> Self {
        self.examples.push(example);
        self
    }
}

pub struct ActionEntry {
    pub def: ActionDef,
    handler: Handler,
}

pub struct Registry {
    entries: BTreeMap<String, ActionEntry>,
    deps: Backends,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry, no backends. Tests and validation-only callers
    /// register what they need.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            deps: Backends::default(),
        }
    }

    /// The full builtin action surface wired to `deps`.
    pub fn with_builtins(deps: Backends) -> Self {
        let mut registry = Self::new();
        registry.deps = deps;
        install_builtins(&mut registry).expect("builtin action names are unique");
        registry
    }

    /// Replace the injected backends. Entries keep referring to the
    /// registry's current set, so this affects subsequent calls only.
    pub fn inject_dependencies(&mut self, deps: Backends) {
        self.deps = deps;
    }

    pub fn register(&mut self, def: ActionDef, handler: Handler) -> Result<(), RegistryError> {
        if self.entries.contains_key(&def.name) {
            return Err(RegistryError::Duplicate(def.name));
        }
        let name = def.name.clone();
        self.entries.insert(name, ActionEntry { def, handler });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn entry(&self, name: &str) -> Option<&ActionEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate, coerce, merge defaults, and invoke the handler.
    pub fn execute(&self, name: &str, params: &Map<String, Value>) -> Result<Value, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAction(name.to_string()))?;
        let merged = validate_params(&entry.def, params)?;
        trace!(target: "registry", action = name, "dispatch");
        (entry.handler)(&merged, &self.deps).map_err(|e| RegistryError::Handler {
            action: name.to_string(),
            kind: e.kind,
            message: e.message,
        })
    }

    /// Validate against the contract without invoking the handler.
    pub fn check_params(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<(), RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAction(name.to_string()))?;
        validate_params(&entry.def, params).map(|_| ())
    }

    pub fn list(&self, category: Option<Category>) -> Vec<&ActionDef> {
        self.entries
            .values()
            .map(|e| &e.def)
            .filter(|d| category.is_none_or(|c| d.category == c))
            .collect()
    }

    /// Markdown listing for humans, grouped by category.
    pub fn generate_documentation(&self, category: Option<Category>) -> String {
        let mut out = String::from("# Action library\n");
        for cat in Category::ALL {
            if category.is_some_and(|c| c != *cat) {
                continue;
            }
            let defs = self.list(Some(*cat));
            if defs.is_empty() {
                continue;
            }
            out.push_str(&format!("\n## {cat}\n\n"));
            for def in defs {
                out.push_str(&format!("### `{}`\n\n{}\n\n", def.name, def.description));
                if !def.required.is_empty() {
                    out.push_str("Required params:\n");
                    for p in &def.required {
                        out.push_str(&format!("- `{}` ({})\n", p.name, p.kind));
                    }
                }
                if !def.optional.is_empty() {
                    out.push_str("Optional params:\n");
                    for p in &def.optional {
                        out.push_str(&format!(
                            "- `{}` ({}, default `{}`)\n",
                            p.spec.name, p.spec.kind, p.default
                        ));
                    }
                }
                if let Some(returns) = &def.returns {
                    out.push_str(&format!("Returns: {returns}\n"));
                }
                for example in &def.examples {
                    out.push_str(&format!("Example: `{example}`\n"));
                }
                out.push('\n');
            }
        }
        out
    }

    /// Machine-readable catalog for the NL front-end. Consumers must refuse
    /// to generate protocols referencing actions absent from this listing.
    pub fn action_library_for_ai(&self) -> Value {
        let actions: Vec<Value> = self
            .entries
            .values()
            .map(|e| {
                let d = &e.def;
                json!({
                    "name": d.name,
                    "category": d.category.to_string(),
                    "description": d.description,
                    "required": d.required.iter().map(|p| json!({
                        "name": p.name,
                        "type": p.kind.to_string(),
                    })).collect::<Vec<_>>(),
                    "optional": d.optional.iter().map(|p| json!({
                        "name": p.spec.name,
                        "type": p.spec.kind.to_string(),
                        "default": p.default,
                    })).collect::<Vec<_>>(),
                    "returns": d.returns,
                    "examples": d.examples,
                })
            })
            .collect();
        json!({ "actions": actions })
    }
}

/// Check declared keys, coerce values, merge defaults. String-to-number
/// coercion is deliberate: variable substitution stringifies everything, so
/// coordinates that went through `{{verified_x}}` arrive as `"100"`.
fn validate_params(
    def: &ActionDef,
    params: &Map<String, Value>,
) -> Result<Map<String, Value>, RegistryError> {
    for key in params.keys() {
        let known = def.required.iter().any(|p| &p.name == key)
            || def.optional.iter().any(|p| &p.spec.name == key);
        if !known {
            return Err(RegistryError::UnknownParam {
                action: def.name.clone(),
                param: key.clone(),
            });
        }
    }

    let mut merged = Map::new();
    for spec in &def.required {
        let value = params
            .get(&spec.name)
            .ok_or_else(|| RegistryError::MissingParam {
                action: def.name.clone(),
                param: spec.name.clone(),
            })?;
        merged.insert(spec.name.clone(), coerce(def, spec, value)?);
    }
    for opt in &def.optional {
        let value = match params.get(&opt.spec.name) {
            Some(value) => coerce(def, &opt.spec, value)?,
            None => opt.default.clone(),
        };
        merged.insert(opt.spec.name.clone(), value);
    }
    Ok(merged)
}

fn coerce(def: &ActionDef, spec: &ParamSpec, value: &Value) -> Result<Value, RegistryError> {
    let mismatch = || RegistryError::ParamType {
        action: def.name.clone(),
        param: spec.name.clone(),
        expected: spec.kind,
        got: type_name(value).to_string(),
    };
    match spec.kind {
        ParamKind::Any => Ok(value.clone()),
        ParamKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        ParamKind::Int => match value {
            Value::Number(n) if n.as_i64().is_some() => Ok(value.clone()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| json!(f as i64))
                .ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| json!(i))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamKind::Float => match value {
            Value::Number(n) => n.as_f64().map(|f| json!(f)).ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(|f| json!(f))
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ParamKind::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim() {
                "true" => Ok(json!(true)),
                "false" => Ok(json!(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        ParamKind::List => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        ParamKind::Map => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
