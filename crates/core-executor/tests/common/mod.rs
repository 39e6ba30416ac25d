//! Shared test fixtures: recording backends, a fake screen, and a scripted
//! vision model. Nothing here touches a real device.

// Each test binary compiles its own copy and uses a different subset.
#![allow(dead_code)]

use core_input::{
    ClipboardBackend, InputError, KeyboardBackend, MouseButton, PointerBackend, ScrollDirection,
};
use core_registry::{Backends, Registry};
use core_screen::{CaptureBackend, ScreenError};
use core_vision::{Verifier, VisionBackend, VisionError};
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

/// Ordered log of backend invocations, shared across mocks.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub struct RecordingKeyboard {
    pub log: EventLog,
}

impl KeyboardBackend for RecordingKeyboard {
    fn tap(&self, key: &str) -> Result<(), InputError> {
        self.log.push(format!("tap:{key}"));
        Ok(())
    }
    fn hold(&self, key: &str) -> Result<(), InputError> {
        self.log.push(format!("hold:{key}"));
        Ok(())
    }
    fn release(&self, key: &str) -> Result<(), InputError> {
        self.log.push(format!("release:{key}"));
        Ok(())
    }
    fn chord(&self, keys: &[String]) -> Result<(), InputError> {
        self.log.push(format!("chord:{}", keys.join("+")));
        Ok(())
    }
    fn type_text(&self, text: &str, interval_ms: u64) -> Result<(), InputError> {
        self.log.push(format!("type:{text}:{interval_ms}"));
        Ok(())
    }
}

pub struct RecordingPointer {
    pub log: EventLog,
}

impl PointerBackend for RecordingPointer {
    fn move_to(&self, x: i32, y: i32, smooth: bool, _speed: f64) -> Result<(), InputError> {
        self.log.push(format!("move:{x},{y}:smooth={smooth}"));
        Ok(())
    }
    fn click(&self, button: MouseButton, clicks: u32) -> Result<(), InputError> {
        self.log.push(format!("click:{button:?}:{clicks}"));
        Ok(())
    }
    fn drag(
        &self,
        to_x: i32,
        to_y: i32,
        button: MouseButton,
        _smooth: bool,
        _speed: f64,
    ) -> Result<(), InputError> {
        self.log.push(format!("drag:{to_x},{to_y}:{button:?}"));
        Ok(())
    }
    fn scroll(&self, direction: ScrollDirection, amount: i32) -> Result<(), InputError> {
        self.log.push(format!("scroll:{direction:?}:{amount}"));
        Ok(())
    }
    fn position(&self) -> Result<(i32, i32), InputError> {
        Ok((7, 9))
    }
}

pub struct RecordingClipboard {
    pub log: EventLog,
    pub contents: Mutex<String>,
}

impl ClipboardBackend for RecordingClipboard {
    fn get_text(&self) -> Result<String, InputError> {
        Ok(self.contents.lock().unwrap().clone())
    }
    fn set_text(&self, text: &str) -> Result<(), InputError> {
        self.log.push(format!("clip:{text}"));
        *self.contents.lock().unwrap() = text.to_string();
        Ok(())
    }
}

pub struct FakeCapture;

impl CaptureBackend for FakeCapture {
    fn capture_screen(&self) -> Result<RgbaImage, ScreenError> {
        Ok(RgbaImage::from_pixel(64, 48, Rgba([0, 0, 0, 255])))
    }
    fn capture_region(&self, _x: u32, _y: u32, w: u32, h: u32) -> Result<RgbaImage, ScreenError> {
        Ok(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255])))
    }
    fn capture_window(&self) -> Result<RgbaImage, ScreenError> {
        self.capture_screen()
    }
    fn dimensions(&self) -> Result<(u32, u32), ScreenError> {
        Ok((64, 48))
    }
    fn window_titles(&self) -> Result<Vec<String>, ScreenError> {
        Ok(vec!["terminal".to_string()])
    }
    fn active_window_title(&self) -> Result<Option<String>, ScreenError> {
        Ok(Some("terminal".to_string()))
    }
}

/// Vision backend that always answers with the given JSON.
pub struct ScriptedVision {
    pub reply: String,
}

impl VisionBackend for ScriptedVision {
    fn analyze(&self, _model: &str, _jpeg: &[u8], _prompt: &str) -> Result<String, VisionError> {
        Ok(self.reply.clone())
    }
}

/// Registry with recording input backends, a fake screen, and an optional
/// scripted vision reply.
pub fn recording_registry(log: &EventLog, vision_reply: Option<&str>) -> Registry {
    let vision = vision_reply.map(|reply| {
        Arc::new(Verifier::with_backend(
            core_config::VisionConfig::default(),
            Box::new(ScriptedVision {
                reply: reply.to_string(),
            }),
        ))
    });
    Registry::with_builtins(Backends {
        keyboard: Some(Arc::new(RecordingKeyboard { log: log.clone() })),
        pointer: Some(Arc::new(RecordingPointer { log: log.clone() })),
        clipboard: Some(Arc::new(RecordingClipboard {
            log: log.clone(),
            contents: Mutex::new(String::new()),
        })),
        screen: Some(Arc::new(FakeCapture)),
        vision,
        abort: core_input::AbortFlag::new(),
    })
}
