//! Screen capture backends and pixel-search helpers.
//!
//! Capture returns owned `image::RgbaImage` bitmaps with known dimensions.
//! Screenshots can be large; callers are expected to treat them as owned by
//! the call that requested them and drop them once consumed (the vision
//! verifier encodes and releases, it never parks a bitmap in the execution
//! context).

use image::RgbaImage;
use std::path::Path;
use thiserror::Error;

mod capture;
mod search;

pub use capture::XcapCapture;
pub use search::{color_matches, find_template};

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("no monitor available")]
    NoMonitor,
    #[error("no capturable window")]
    NoWindow,
    #[error("requested region {x},{y} {width}x{height} exceeds screen {screen_width}x{screen_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        screen_width: u32,
        screen_height: u32,
    },
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("image encode failed: {0}")]
    Encode(String),
}

/// Host screen access. Implementations must be callable from whichever
/// thread runs the executor.
pub trait CaptureBackend: Send + Sync {
    fn capture_screen(&self) -> Result<RgbaImage, ScreenError>;
    fn capture_region(&self, x: u32, y: u32, width: u32, height: u32)
    -> Result<RgbaImage, ScreenError>;
    /// Capture the focused window.
    fn capture_window(&self) -> Result<RgbaImage, ScreenError>;
    /// Primary monitor dimensions.
    fn dimensions(&self) -> Result<(u32, u32), ScreenError>;
    /// Titles of every capturable window, used by `wait_for_window`.
    fn window_titles(&self) -> Result<Vec<String>, ScreenError>;
    fn active_window_title(&self) -> Result<Option<String>, ScreenError>;

    /// RGBA of a single pixel. The default goes through a 1x1 region
    /// capture; implementations may do better.
    fn pixel(&self, x: u32, y: u32) -> Result<[u8; 4], ScreenError> {
        let img = self.capture_region(x, y, 1, 1)?;
        let p = img.get_pixel(0, 0);
        Ok(p.0)
    }
}

/// Write a bitmap to disk. The extension picks the format; `.png` is the
/// conventional choice for `save_screenshot`.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<(), ScreenError> {
    image
        .save(path)
        .map_err(|e| ScreenError::Encode(e.to_string()))
}
