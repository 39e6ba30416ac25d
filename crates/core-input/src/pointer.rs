//! `enigo`-backed pointer synthesis with smooth curved paths.
//!
//! Programmatic moves follow a quadratic Bézier whose control point is
//! pushed perpendicular to the travel line, with sub-pixel noise on the
//! intermediate samples and a duration proportional to distance. Raw
//! teleportation (`smooth = false`) exists for tests and dry-run probes.
//! Path planning is a pure function so the curve shape is testable without
//! a display.

use crate::{AbortFlag, InputError, MouseButton, PointerBackend, ScrollDirection};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Mouse, Settings};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// Sampled trajectory: absolute points plus the per-step delay.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPlan {
    pub points: Vec<(i32, i32)>,
    pub step_delay: Duration,
}

// splitmix64; keeps the jitter deterministic per endpoint pair so path
// tests are reproducible.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

struct Jitter(u64);

impl Jitter {
    fn new(seed: u64) -> Self {
        Self(mix(seed))
    }

    /// Uniform-ish value in [-1, 1].
    fn next(&mut self) -> f64 {
        self.0 = mix(self.0);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
    }
}

/// Plan a curved path from `from` to `to`. `speed` scales duration
/// (1.0 = default pace, higher = faster). The final point is always exactly
/// `to`; intermediate points carry at most ±1px of noise.
pub fn plan_path(from: (i32, i32), to: (i32, i32), speed: f64) -> PathPlan {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (x1, y1) = (to.0 as f64, to.1 as f64);
    let dist = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    if dist < 2.0 {
        return PathPlan {
            points: vec![to],
            step_delay: Duration::ZERO,
        };
    }

    let seed = (from.0 as u64) << 48 ^ (from.1 as u64) << 32 ^ (to.0 as u64) << 16 ^ to.1 as u64;
    let mut jitter = Jitter::new(seed);

    // Control point: midpoint pushed perpendicular to the travel line.
    let bulge = (dist / 6.0).min(120.0) * jitter.next();
    let (mx, my) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
    let (px, py) = (-(y1 - y0) / dist, (x1 - x0) / dist);
    let (cx, cy) = (mx + px * bulge, my + py * bulge);

    let steps = ((dist / 8.0) as usize).clamp(12, 96);
    let duration_ms = (dist * 1.1 / speed.max(0.1)).clamp(80.0, 1_200.0);

    let mut points = Vec::with_capacity(steps);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let u = 1.0 - t;
        let mut x = u * u * x0 + 2.0 * u * t * cx + t * t * x1;
        let mut y = u * u * y0 + 2.0 * u * t * cy + t * t * y1;
        if i < steps {
            x += jitter.next();
            y += jitter.next();
        }
        points.push((x.round() as i32, y.round() as i32));
    }
    // Land exactly on target regardless of rounding.
    *points.last_mut().expect("steps >= 12") = to;

    PathPlan {
        points,
        step_delay: Duration::from_millis((duration_ms / steps as f64) as u64),
    }
}

pub struct EnigoPointer {
    inner: Mutex<Enigo>,
    abort: AbortFlag,
    last_commanded: Mutex<Option<(i32, i32)>>,
}

impl EnigoPointer {
    pub fn new(abort: AbortFlag) -> Result<Self, InputError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InputError::Synthesis(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(enigo),
            abort,
            last_commanded: Mutex::new(None),
        })
    }

    /// Where the engine last placed the pointer. The mouse-move watchdog
    /// compares this against the live position to detect the operator
    /// grabbing the mouse.
    pub fn last_commanded(&self) -> Option<(i32, i32)> {
        *self
            .last_commanded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn raw_move(&self, x: i32, y: i32) -> Result<(), InputError> {
        self.abort.check()?;
        let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InputError::Synthesis(e.to_string()))?;
        *self
            .last_commanded
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((x, y));
        Ok(())
    }

    fn walk(&self, plan: &PathPlan) -> Result<(), InputError> {
        for &(x, y) in &plan.points {
            self.raw_move(x, y)?;
            if !plan.step_delay.is_zero() {
                std::thread::sleep(plan.step_delay);
            }
        }
        Ok(())
    }

    fn button_event(&self, button: Button, direction: Direction) -> Result<(), InputError> {
        self.abort.check()?;
        let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        enigo
            .button(button, direction)
            .map_err(|e| InputError::Synthesis(e.to_string()))
    }
}

fn to_enigo_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Middle => Button::Middle,
        MouseButton::Right => Button::Right,
    }
}

impl PointerBackend for EnigoPointer {
    fn move_to(&self, x: i32, y: i32, smooth: bool, speed: f64) -> Result<(), InputError> {
        debug!(target: "input.mouse", x, y, smooth, "mouse_move");
        if !smooth {
            return self.raw_move(x, y);
        }
        let from = self.position()?;
        let plan = plan_path(from, (x, y), speed);
        self.walk(&plan)
    }

    fn click(&self, button: MouseButton, clicks: u32) -> Result<(), InputError> {
        debug!(target: "input.mouse", ?button, clicks, "mouse_click");
        let btn = to_enigo_button(button);
        for i in 0..clicks.max(1) {
            self.button_event(btn, Direction::Click)?;
            if i + 1 < clicks {
                // Within double-click latency on every desktop we target.
                std::thread::sleep(Duration::from_millis(60));
            }
        }
        Ok(())
    }

    fn drag(
        &self,
        to_x: i32,
        to_y: i32,
        button: MouseButton,
        smooth: bool,
        speed: f64,
    ) -> Result<(), InputError> {
        debug!(target: "input.mouse", to_x, to_y, ?button, "mouse_drag");
        let btn = to_enigo_button(button);
        self.button_event(btn, Direction::Press)?;
        let moved = self.move_to(to_x, to_y, smooth, speed);
        // Always release, abort included: a stuck drag grabs the desktop.
        let released = self.button_event(btn, Direction::Release);
        moved.and(released)
    }

    fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), InputError> {
        trace!(target: "input.mouse", ?direction, amount, "mouse_scroll");
        self.abort.check()?;
        let (axis, signed) = match direction {
            ScrollDirection::Up => (Axis::Vertical, -amount),
            ScrollDirection::Down => (Axis::Vertical, amount),
            ScrollDirection::Left => (Axis::Horizontal, -amount),
            ScrollDirection::Right => (Axis::Horizontal, amount),
        };
        let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        enigo
            .scroll(signed, axis)
            .map_err(|e| InputError::Synthesis(e.to_string()))
    }

    fn position(&self) -> Result<(i32, i32), InputError> {
        let enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        enigo
            .location()
            .map_err(|e| InputError::Synthesis(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hop_is_a_single_point() {
        let plan = plan_path((10, 10), (11, 10), 1.0);
        assert_eq!(plan.points, vec![(11, 10)]);
        assert_eq!(plan.step_delay, Duration::ZERO);
    }

    #[test]
    fn path_lands_exactly_on_target() {
        let plan = plan_path((0, 0), (800, 400), 1.0);
        assert_eq!(*plan.points.last().unwrap(), (800, 400));
        assert!(plan.points.len() >= 12 && plan.points.len() <= 96);
        assert!(!plan.step_delay.is_zero());
    }

    #[test]
    fn path_is_deterministic_per_endpoints() {
        let a = plan_path((5, 5), (600, 300), 1.0);
        let b = plan_path((5, 5), (600, 300), 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn higher_speed_shortens_step_delay() {
        let slow = plan_path((0, 0), (1000, 0), 1.0);
        let fast = plan_path((0, 0), (1000, 0), 4.0);
        assert!(fast.step_delay < slow.step_delay);
    }

    #[test]
    fn path_stays_in_the_neighborhood_of_the_segment() {
        let plan = plan_path((0, 0), (1000, 0), 1.0);
        for (x, y) in plan.points {
            assert!((-5..=1005).contains(&x));
            // bulge capped at dist/6 plus noise
            assert!(y.abs() <= 1000 / 6 + 3, "y = {y}");
        }
    }
}
