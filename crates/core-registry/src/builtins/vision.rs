//! Vision actions. Each one funnels into the verifier with a different
//! request kind; the verdict comes back as the action result and the
//! executor mirrors it into context variables.

use super::{f64_arg, region_arg, str_arg};
use crate::{ActionDef, Backends, Category, HandlerError, ParamKind, Registry, RegistryError};
use core_vision::{VerifyKind, VerifyRequest};
use serde_json::{Map, Value, json};

fn run_verify(
    deps: &Backends,
    kind: VerifyKind,
    context: &str,
    expected: &str,
    params: &Map<String, Value>,
) -> Result<Value, HandlerError> {
    let request = VerifyRequest {
        kind,
        context: context.to_string(),
        expected: expected.to_string(),
        confidence_threshold: f64_arg(params, "confidence_threshold")?,
        region: region_arg(params, "region")?,
    };
    let verifier = deps.vision()?;
    let screen = deps.screen()?;
    let result = verifier.verify(screen.as_ref(), &request);
    serde_json::to_value(result).map_err(|e| HandlerError::other(e.to_string()))
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(
            "verify_screen",
            Category::Vision,
            "Screenshot the screen and ask the vision model whether the expected state holds.",
        )
        .required("context", ParamKind::String)
        .required("expected", ParamKind::String)
        .optional("confidence_threshold", ParamKind::Float, json!(0.8))
        .optional("region", ParamKind::List, json!([]))
        .returns("VerificationResult")
        .example(json!({
            "action": "verify_screen",
            "params": {"context": "opened gmail", "expected": "inbox is visible"}
        })),
        Box::new(|params, deps| {
            run_verify(
                deps,
                VerifyKind::Screen,
                str_arg(params, "context")?,
                str_arg(params, "expected")?,
                params,
            )
        }),
    )?;

    registry.register(
        ActionDef::new(
            "verify_element",
            Category::Vision,
            "Check that a described UI element is visible.",
        )
        .required("element", ParamKind::String)
        .optional("confidence_threshold", ParamKind::Float, json!(0.8))
        .optional("region", ParamKind::List, json!([]))
        .returns("VerificationResult"),
        Box::new(|params, deps| {
            let element = str_arg(params, "element")?;
            run_verify(
                deps,
                VerifyKind::Element,
                "checking for a specific UI element",
                element,
                params,
            )
        }),
    )?;

    registry.register(
        ActionDef::new(
            "find_element",
            Category::Vision,
            "Locate a described UI element; the verdict carries its coordinates.",
        )
        .required("element", ParamKind::String)
        .optional("confidence_threshold", ParamKind::Float, json!(0.8))
        .optional("region", ParamKind::List, json!([]))
        .returns("VerificationResult with updated_coordinates"),
        Box::new(|params, deps| {
            let element = str_arg(params, "element")?;
            run_verify(
                deps,
                VerifyKind::FindElement,
                "locating a UI element to interact with",
                element,
                params,
            )
        }),
    )?;

    registry.register(
        ActionDef::new(
            "verify_text",
            Category::Vision,
            "Check that specific text is visible on screen.",
        )
        .required("text", ParamKind::String)
        .optional("confidence_threshold", ParamKind::Float, json!(0.8))
        .optional("region", ParamKind::List, json!([]))
        .returns("VerificationResult"),
        Box::new(|params, deps| {
            let text = str_arg(params, "text")?;
            run_verify(
                deps,
                VerifyKind::Text,
                "checking for visible text",
                text,
                params,
            )
        }),
    )?;

    Ok(())
}
