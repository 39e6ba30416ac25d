//! Input synthesis backends: keyboard, pointer, clipboard.
//!
//! The traits here are the seam between the action registry and the host.
//! Handlers only see trait objects, so tests substitute recording mocks and
//! dry-run never touches a real device. The concrete implementations wrap
//! `enigo` (key/mouse synthesis) and `arboard` (clipboard).
//!
//! Every implementation checks the shared [`AbortFlag`] before each synthetic
//! event. A tripped flag turns the next event into `InputError::Aborted`
//! rather than firing it, which is what makes operator stop effective
//! mid-typing or mid-path, not just between actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

mod clipboard;
mod keyboard;
mod keys;
mod pointer;

pub use clipboard::SystemClipboard;
pub use keyboard::EnigoKeyboard;
pub use keys::{KeyChord, ModMask, parse_chord, parse_key_name};
pub use pointer::{EnigoPointer, PathPlan, plan_path};

#[derive(Debug, Error)]
pub enum InputError {
    /// The abort flag fired; the event was suppressed.
    #[error("input aborted by stop flag")]
    Aborted,
    #[error("unknown key name `{0}`")]
    UnknownKey(String),
    #[error("unknown mouse button `{0}`")]
    UnknownButton(String),
    #[error("unknown scroll direction `{0}`")]
    UnknownDirection(String),
    #[error("input synthesis failed: {0}")]
    Synthesis(String),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Process-wide fail-safe. Cloned into every backend and the executor;
/// deliberately passed by handle instead of living in a global so tests can
/// run several engines side by side.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the flag. Idempotent.
    pub fn trip(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Gate called before every synthetic event.
    pub fn check(&self) -> Result<(), InputError> {
        if self.is_tripped() {
            Err(InputError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    pub fn parse(name: &str) -> Result<Self, InputError> {
        match name.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "middle" => Ok(Self::Middle),
            "right" => Ok(Self::Right),
            other => Err(InputError::UnknownButton(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn parse(name: &str) -> Result<Self, InputError> {
        match name.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(InputError::UnknownDirection(other.to_string())),
        }
    }
}

/// Key presses, chords, and text entry. Key names are the protocol-level
/// strings (`"enter"`, `"ctrl"`, `"f5"`, single characters); implementations
/// resolve them via [`parse_key_name`].
pub trait KeyboardBackend: Send + Sync {
    /// Press and release one key.
    fn tap(&self, key: &str) -> Result<(), InputError>;
    /// Press without releasing (paired with [`KeyboardBackend::release`]).
    fn hold(&self, key: &str) -> Result<(), InputError>;
    fn release(&self, key: &str) -> Result<(), InputError>;
    /// Modifier-style combination: all keys pressed in order, released in
    /// reverse (`["ctrl", "l"]`).
    fn chord(&self, keys: &[String]) -> Result<(), InputError>;
    /// Type text one character at a time, sleeping `interval_ms` between
    /// characters when non-zero.
    fn type_text(&self, text: &str, interval_ms: u64) -> Result<(), InputError>;
}

pub trait PointerBackend: Send + Sync {
    /// Move to absolute coordinates. `smooth` follows a curved path with
    /// duration proportional to distance scaled by `speed`; raw teleport is
    /// for tests and dry-run only.
    fn move_to(&self, x: i32, y: i32, smooth: bool, speed: f64) -> Result<(), InputError>;
    fn click(&self, button: MouseButton, clicks: u32) -> Result<(), InputError>;
    fn drag(
        &self,
        to_x: i32,
        to_y: i32,
        button: MouseButton,
        smooth: bool,
        speed: f64,
    ) -> Result<(), InputError>;
    fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), InputError>;
    fn position(&self) -> Result<(i32, i32), InputError>;
}

pub trait ClipboardBackend: Send + Sync {
    fn get_text(&self) -> Result<String, InputError>;
    fn set_text(&self, text: &str) -> Result<(), InputError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_flag_round_trip() {
        let flag = AbortFlag::new();
        assert!(flag.check().is_ok());
        flag.trip();
        flag.trip(); // idempotent
        assert!(flag.is_tripped());
        assert!(matches!(flag.check(), Err(InputError::Aborted)));
        flag.clear();
        assert!(flag.check().is_ok());
    }

    #[test]
    fn clones_share_state() {
        let flag = AbortFlag::new();
        let other = flag.clone();
        other.trip();
        assert!(flag.is_tripped());
    }

    #[test]
    fn button_and_direction_parsing() {
        assert_eq!(MouseButton::parse("Left").unwrap(), MouseButton::Left);
        assert!(MouseButton::parse("fourth").is_err());
        assert_eq!(ScrollDirection::parse("down").unwrap(), ScrollDirection::Down);
        assert!(ScrollDirection::parse("sideways").is_err());
    }
}
