//! `xcap`-backed capture of monitors and windows.

use crate::{CaptureBackend, ScreenError};
use image::RgbaImage;
use tracing::debug;
use xcap::{Monitor, Window};

/// Captures from the primary monitor (or the first one when the platform
/// does not report a primary). `xcap` handles are not kept between calls;
/// monitors can appear and disappear at run time.
pub struct XcapCapture;

impl XcapCapture {
    pub fn new() -> Self {
        Self
    }

    fn primary_monitor() -> Result<Monitor, ScreenError> {
        let monitors = Monitor::all().map_err(|e| ScreenError::Capture(e.to_string()))?;
        let mut first = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                return Ok(monitor);
            }
            if first.is_none() {
                first = Some(monitor);
            }
        }
        first.ok_or(ScreenError::NoMonitor)
    }

    fn focused_window() -> Result<Window, ScreenError> {
        let windows = Window::all().map_err(|e| ScreenError::Capture(e.to_string()))?;
        let mut fallback = None;
        for window in windows {
            if window.is_focused().unwrap_or(false) {
                return Ok(window);
            }
            if fallback.is_none() && !window.is_minimized().unwrap_or(true) {
                fallback = Some(window);
            }
        }
        fallback.ok_or(ScreenError::NoWindow)
    }
}

impl Default for XcapCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for XcapCapture {
    fn capture_screen(&self) -> Result<RgbaImage, ScreenError> {
        let monitor = Self::primary_monitor()?;
        let image = monitor
            .capture_image()
            .map_err(|e| ScreenError::Capture(e.to_string()))?;
        debug!(target: "screen", width = image.width(), height = image.height(), "capture_screen");
        Ok(image)
    }

    fn capture_region(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, ScreenError> {
        let full = self.capture_screen()?;
        if x.saturating_add(width) > full.width() || y.saturating_add(height) > full.height() {
            return Err(ScreenError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                screen_width: full.width(),
                screen_height: full.height(),
            });
        }
        Ok(image::imageops::crop_imm(&full, x, y, width, height).to_image())
    }

    fn capture_window(&self) -> Result<RgbaImage, ScreenError> {
        let window = Self::focused_window()?;
        let title = window.title().unwrap_or_default();
        let image = window
            .capture_image()
            .map_err(|e| ScreenError::Capture(e.to_string()))?;
        debug!(target: "screen", title = %title, "capture_window");
        Ok(image)
    }

    fn dimensions(&self) -> Result<(u32, u32), ScreenError> {
        let monitor = Self::primary_monitor()?;
        let width = monitor
            .width()
            .map_err(|e| ScreenError::Capture(e.to_string()))?;
        let height = monitor
            .height()
            .map_err(|e| ScreenError::Capture(e.to_string()))?;
        Ok((width, height))
    }

    fn window_titles(&self) -> Result<Vec<String>, ScreenError> {
        let windows = Window::all().map_err(|e| ScreenError::Capture(e.to_string()))?;
        Ok(windows
            .into_iter()
            .filter_map(|w| w.title().ok())
            .filter(|t| !t.is_empty())
            .collect())
    }

    fn active_window_title(&self) -> Result<Option<String>, ScreenError> {
        let windows = Window::all().map_err(|e| ScreenError::Capture(e.to_string()))?;
        for window in windows {
            if window.is_focused().unwrap_or(false) {
                return Ok(window.title().ok());
            }
        }
        Ok(None)
    }
}
