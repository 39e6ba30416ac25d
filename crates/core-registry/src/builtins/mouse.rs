//! Mouse actions.

use super::{bool_arg, f64_arg, i32_arg, i64_arg, str_arg};
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use core_input::{MouseButton, PointerBackend, ScrollDirection};
use serde_json::{Value, json};

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new(
            "mouse_move",
            Category::Mouse,
            "Move the pointer to absolute coordinates along a smooth curved path.",
        )
        .required("x", ParamKind::Int)
        .required("y", ParamKind::Int)
        .optional("smooth", ParamKind::Bool, json!(true))
        .optional("speed", ParamKind::Float, json!(1.0))
        .example(json!({"action": "mouse_move", "params": {"x": 640, "y": 400}})),
        Box::new(|params, deps| {
            deps.pointer()?.move_to(
                i32_arg(params, "x")?,
                i32_arg(params, "y")?,
                bool_arg(params, "smooth")?,
                f64_arg(params, "speed")?,
            )?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("mouse_click", Category::Mouse, "Click at the current pointer position.")
            .optional("button", ParamKind::String, json!("left"))
            .optional("clicks", ParamKind::Int, json!(1)),
        Box::new(|params, deps| {
            let button = MouseButton::parse(str_arg(params, "button")?)?;
            let clicks = i64_arg(params, "clicks")?.max(1) as u32;
            deps.pointer()?.click(button, clicks)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("mouse_double_click", Category::Mouse, "Double-click the left button.")
            .optional("button", ParamKind::String, json!("left")),
        Box::new(|params, deps| {
            let button = MouseButton::parse(str_arg(params, "button")?)?;
            deps.pointer()?.click(button, 2)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("mouse_right_click", Category::Mouse, "Right-click at the current position."),
        Box::new(|_params, deps| {
            deps.pointer()?.click(MouseButton::Right, 1)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "mouse_drag",
            Category::Mouse,
            "Press, move to the target coordinates, release.",
        )
        .required("to_x", ParamKind::Int)
        .required("to_y", ParamKind::Int)
        .optional("button", ParamKind::String, json!("left"))
        .optional("smooth", ParamKind::Bool, json!(true))
        .optional("speed", ParamKind::Float, json!(1.0)),
        Box::new(|params, deps| {
            deps.pointer()?.drag(
                i32_arg(params, "to_x")?,
                i32_arg(params, "to_y")?,
                MouseButton::parse(str_arg(params, "button")?)?,
                bool_arg(params, "smooth")?,
                f64_arg(params, "speed")?,
            )?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("mouse_scroll", Category::Mouse, "Scroll the wheel.")
            .required("direction", ParamKind::String)
            .optional("amount", ParamKind::Int, json!(3))
            .example(json!({"action": "mouse_scroll", "params": {"direction": "down", "amount": 5}})),
        Box::new(|params, deps| {
            let direction = ScrollDirection::parse(str_arg(params, "direction")?)?;
            deps.pointer()?
                .scroll(direction, i64_arg(params, "amount")? as i32)?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new("mouse_position", Category::Mouse, "Report the current pointer position.")
            .returns("{x: int, y: int}"),
        Box::new(|_params, deps| {
            let (x, y) = deps.pointer()?.position()?;
            Ok(json!({"x": x, "y": y}))
        }),
    )?;

    Ok(())
}
