//! Screen capture actions. Results carry dimensions only; bitmaps are
//! dropped (or written to disk) before the record lands in the context.

use super::{region_arg, str_arg, u32_arg};
use core_screen::CaptureBackend;
use crate::{ActionDef, Category, ParamKind, Registry, RegistryError};
use serde_json::json;
use std::path::Path;

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new("capture_screen", Category::Screen, "Capture the full screen.")
            .returns("{width: int, height: int}"),
        Box::new(|_params, deps| {
            let image = deps.screen()?.capture_screen()?;
            Ok(json!({"width": image.width(), "height": image.height()}))
        }),
    )?;

    registry.register(
        ActionDef::new("capture_region", Category::Screen, "Capture a rectangle of the screen.")
            .required("x", ParamKind::Int)
            .required("y", ParamKind::Int)
            .required("width", ParamKind::Int)
            .required("height", ParamKind::Int)
            .returns("{width: int, height: int}"),
        Box::new(|params, deps| {
            let image = deps.screen()?.capture_region(
                u32_arg(params, "x")?,
                u32_arg(params, "y")?,
                u32_arg(params, "width")?,
                u32_arg(params, "height")?,
            )?;
            Ok(json!({"width": image.width(), "height": image.height()}))
        }),
    )?;

    registry.register(
        ActionDef::new("capture_window", Category::Screen, "Capture the focused window.")
            .returns("{width: int, height: int}"),
        Box::new(|_params, deps| {
            let image = deps.screen()?.capture_window()?;
            Ok(json!({"width": image.width(), "height": image.height()}))
        }),
    )?;

    registry.register(
        ActionDef::new(
            "save_screenshot",
            Category::Screen,
            "Capture the screen (or a region) and write it to disk; the extension picks the format.",
        )
        .required("path", ParamKind::String)
        .optional("region", ParamKind::List, json!([]))
        .example(json!({"action": "save_screenshot", "params": {"path": "shot.png"}})),
        Box::new(|params, deps| {
            let path = str_arg(params, "path")?;
            let screen = deps.screen()?;
            let image = match region_arg(params, "region")? {
                Some((x, y, w, h)) => screen.capture_region(x, y, w, h)?,
                None => screen.capture_screen()?,
            };
            core_screen::save_image(&image, Path::new(path))?;
            Ok(json!({"path": path, "width": image.width(), "height": image.height()}))
        }),
    )?;

    Ok(())
}
