//! `arboard`-backed system clipboard.

use crate::{ClipboardBackend, InputError};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, InputError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| InputError::Clipboard(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }
}

impl ClipboardBackend for SystemClipboard {
    fn get_text(&self) -> Result<String, InputError> {
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        clipboard
            .get_text()
            .map_err(|e| InputError::Clipboard(e.to_string()))
    }

    fn set_text(&self, text: &str) -> Result<(), InputError> {
        debug!(target: "input", size = text.len(), "clipboard_set");
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        clipboard
            .set_text(text.to_string())
            .map_err(|e| InputError::Clipboard(e.to_string()))
    }
}
