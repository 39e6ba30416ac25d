//! `enigo`-backed keyboard synthesis.

use crate::keys::{parse_chord, parse_key_name};
use crate::{AbortFlag, InputError, KeyboardBackend};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

pub struct EnigoKeyboard {
    inner: Mutex<Enigo>,
    abort: AbortFlag,
}

impl EnigoKeyboard {
    pub fn new(abort: AbortFlag) -> Result<Self, InputError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InputError::Synthesis(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(enigo),
            abort,
        })
    }

    fn key_event(&self, key: Key, direction: Direction) -> Result<(), InputError> {
        self.abort.check()?;
        let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        enigo
            .key(key, direction)
            .map_err(|e| InputError::Synthesis(e.to_string()))
    }
}

impl KeyboardBackend for EnigoKeyboard {
    fn tap(&self, key: &str) -> Result<(), InputError> {
        let k = parse_key_name(key)?;
        trace!(target: "input", key, "key_tap");
        self.key_event(k, Direction::Click)
    }

    fn hold(&self, key: &str) -> Result<(), InputError> {
        let k = parse_key_name(key)?;
        trace!(target: "input", key, "key_hold");
        self.key_event(k, Direction::Press)
    }

    fn release(&self, key: &str) -> Result<(), InputError> {
        let k = parse_key_name(key)?;
        trace!(target: "input", key, "key_release");
        self.key_event(k, Direction::Release)
    }

    fn chord(&self, keys: &[String]) -> Result<(), InputError> {
        let chord = parse_chord(keys)?;
        let mut order = chord.mods.keys();
        order.extend(chord.keys.iter().copied());
        debug!(target: "input", keys = ?keys, "chord");

        let mut pressed: Vec<Key> = Vec::with_capacity(order.len());
        let mut result = Ok(());
        for key in &order {
            match self.key_event(*key, Direction::Press) {
                Ok(()) => pressed.push(*key),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        // Release whatever made it down, reverse order, even on abort:
        // leaving a modifier wedged would keep corrupting host input long
        // after the run ended.
        for key in pressed.iter().rev() {
            let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = enigo.key(*key, Direction::Release);
        }
        result
    }

    fn type_text(&self, text: &str, interval_ms: u64) -> Result<(), InputError> {
        debug!(target: "input", size = text.len(), interval_ms, "type_text");
        if interval_ms == 0 {
            self.abort.check()?;
            let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            return enigo
                .text(text)
                .map_err(|e| InputError::Synthesis(e.to_string()));
        }
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.abort.check()?;
            {
                let mut enigo = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
                enigo
                    .text(ch.encode_utf8(&mut buf))
                    .map_err(|e| InputError::Synthesis(e.to_string()))?;
            }
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
        Ok(())
    }
}
