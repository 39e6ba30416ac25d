//! Timing and wait actions. Every wait takes an explicit `timeout_ms` and
//! polls on an interval, checking the abort flag each round so operator
//! stop interrupts a wait instead of letting it run its deadline out.

use super::{str_arg, u32_arg, u64_arg};
use crate::{ActionDef, Backends, Category, HandlerError, ParamKind, Registry, RegistryError};
use core_screen::{CaptureBackend, color_matches, find_template};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Sleep that honors the abort flag at slice granularity.
fn abortable_sleep(deps: &Backends, total: Duration) -> Result<(), HandlerError> {
    let deadline = Instant::now() + total;
    loop {
        deps.abort.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Poll `probe` until it yields a value or `timeout_ms` expires.
fn poll_until<T>(
    deps: &Backends,
    timeout_ms: u64,
    poll_ms: u64,
    what: &str,
    mut probe: impl FnMut() -> Result<Option<T>, HandlerError>,
) -> Result<(T, u64), HandlerError> {
    let start = Instant::now();
    loop {
        deps.abort.check()?;
        if let Some(found) = probe()? {
            return Ok((found, start.elapsed().as_millis() as u64));
        }
        if start.elapsed() >= Duration::from_millis(timeout_ms) {
            return Err(HandlerError::timeout(format!(
                "{what} not satisfied within {timeout_ms}ms"
            )));
        }
        abortable_sleep(deps, Duration::from_millis(poll_ms))?;
    }
}

fn rgb_arg(params: &Map<String, Value>, name: &str) -> Result<[u8; 3], HandlerError> {
    let items = params
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| HandlerError::other(format!("param `{name}` must be [r, g, b]")))?;
    if items.len() != 3 {
        return Err(HandlerError::other(format!("param `{name}` must be [r, g, b]")));
    }
    let mut rgb = [0u8; 3];
    for (slot, item) in rgb.iter_mut().zip(items) {
        *slot = item
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| HandlerError::other(format!("param `{name}` channels must be 0-255")))?;
    }
    Ok(rgb)
}

pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(
        ActionDef::new("delay", Category::Timing, "Sleep for a fixed number of milliseconds.")
            .required("ms", ParamKind::Int)
            .example(json!({"action": "delay", "params": {"ms": 1500}})),
        Box::new(|params, deps| {
            abortable_sleep(deps, Duration::from_millis(u64_arg(params, "ms")?))?;
            Ok(Value::Null)
        }),
    )?;

    registry.register(
        ActionDef::new(
            "wait_for_window",
            Category::Timing,
            "Wait until a window whose title contains the given text exists.",
        )
        .required("title", ParamKind::String)
        .optional("timeout_ms", ParamKind::Int, json!(10_000))
        .optional("poll_ms", ParamKind::Int, json!(500)),
        Box::new(|params, deps| {
            let title = str_arg(params, "title")?.to_ascii_lowercase();
            let screen = deps.screen()?.clone();
            let (matched, elapsed_ms) = poll_until(
                deps,
                u64_arg(params, "timeout_ms")?,
                u64_arg(params, "poll_ms")?,
                "window title",
                move || {
                    let titles = screen.window_titles()?;
                    Ok(titles
                        .into_iter()
                        .find(|t| t.to_ascii_lowercase().contains(&title)))
                },
            )?;
            Ok(json!({"title": matched, "elapsed_ms": elapsed_ms}))
        }),
    )?;

    registry.register(
        ActionDef::new(
            "wait_for_image",
            Category::Timing,
            "Wait until a template image appears on screen; reports its center.",
        )
        .required("path", ParamKind::String)
        .optional("timeout_ms", ParamKind::Int, json!(10_000))
        .optional("poll_ms", ParamKind::Int, json!(500))
        .optional("tolerance", ParamKind::Int, json!(10))
        .returns("{x: int, y: int, elapsed_ms: int}"),
        Box::new(|params, deps| {
            let template = image::open(str_arg(params, "path")?)
                .map_err(|e| HandlerError::other(format!("template load failed: {e}")))?
                .to_rgba8();
            let tolerance = u32_arg(params, "tolerance")?.min(255) as u8;
            let screen = deps.screen()?.clone();
            let ((x, y), elapsed_ms) = poll_until(
                deps,
                u64_arg(params, "timeout_ms")?,
                u64_arg(params, "poll_ms")?,
                "template image",
                move || {
                    let haystack = screen.capture_screen()?;
                    Ok(find_template(&haystack, &template, tolerance).map(|(tx, ty)| {
                        (tx + template.width() / 2, ty + template.height() / 2)
                    }))
                },
            )?;
            Ok(json!({"x": x, "y": y, "elapsed_ms": elapsed_ms}))
        }),
    )?;

    registry.register(
        ActionDef::new(
            "wait_for_color",
            Category::Timing,
            "Wait until the pixel at (x, y) matches an [r, g, b] color within tolerance.",
        )
        .required("x", ParamKind::Int)
        .required("y", ParamKind::Int)
        .required("color", ParamKind::List)
        .optional("timeout_ms", ParamKind::Int, json!(10_000))
        .optional("poll_ms", ParamKind::Int, json!(250))
        .optional("tolerance", ParamKind::Int, json!(10)),
        Box::new(|params, deps| {
            let (x, y) = (u32_arg(params, "x")?, u32_arg(params, "y")?);
            let expected = rgb_arg(params, "color")?;
            let tolerance = u32_arg(params, "tolerance")?.min(255) as u8;
            let screen = deps.screen()?.clone();
            let (_, elapsed_ms) = poll_until(
                deps,
                u64_arg(params, "timeout_ms")?,
                u64_arg(params, "poll_ms")?,
                "pixel color",
                move || {
                    let actual = screen.pixel(x, y)?;
                    Ok(color_matches(actual, expected, tolerance).then_some(()))
                },
            )?;
            Ok(json!({"elapsed_ms": elapsed_ms}))
        }),
    )?;

    Ok(())
}
