//! Platform chord table for the shortcut-driven builtins.
//!
//! macOS swaps ctrl for cmd on the editing and browser chords and has its
//! own window-management conventions; Windows and Linux share the common
//! desktop defaults. Handlers never spell a chord inline; everything
//! routes through these constants so the platform differences live in one
//! place.

#[cfg(not(target_os = "macos"))]
mod table {
    pub const COPY: &[&str] = &["ctrl", "c"];
    pub const PASTE: &[&str] = &["ctrl", "v"];
    pub const CUT: &[&str] = &["ctrl", "x"];
    pub const SELECT_ALL: &[&str] = &["ctrl", "a"];
    pub const UNDO: &[&str] = &["ctrl", "z"];
    pub const REDO: &[&str] = &["ctrl", "y"];
    pub const FIND_REPLACE: &[&str] = &["ctrl", "h"];
    pub const ADDRESS_BAR: &[&str] = &["ctrl", "l"];
    pub const NEW_TAB: &[&str] = &["ctrl", "t"];
    pub const CLOSE_TAB: &[&str] = &["ctrl", "w"];
    pub const NEXT_TAB: &[&str] = &["ctrl", "tab"];
    pub const BACK: &[&str] = &["alt", "left"];
    pub const FORWARD: &[&str] = &["alt", "right"];
    pub const REFRESH: &[&str] = &["f5"];
    pub const BOOKMARK: &[&str] = &["ctrl", "d"];
    pub const FIND: &[&str] = &["ctrl", "f"];
    pub const OPEN_FILE: &[&str] = &["ctrl", "o"];
    pub const SAVE: &[&str] = &["ctrl", "s"];
    pub const SAVE_AS: &[&str] = &["ctrl", "shift", "s"];
    pub const CLOSE_APP: &[&str] = &["alt", "f4"];
    pub const SWITCH_WINDOW: &[&str] = &["alt", "tab"];
    pub const MINIMIZE: &[&str] = &["meta", "down"];
    pub const MAXIMIZE: &[&str] = &["meta", "up"];
    pub const LOCK: &[&str] = &["meta", "l"];
    pub const APP_LAUNCHER: &[&str] = &["meta"];
}

#[cfg(target_os = "macos")]
mod table {
    pub const COPY: &[&str] = &["cmd", "c"];
    pub const PASTE: &[&str] = &["cmd", "v"];
    pub const CUT: &[&str] = &["cmd", "x"];
    pub const SELECT_ALL: &[&str] = &["cmd", "a"];
    pub const UNDO: &[&str] = &["cmd", "z"];
    pub const REDO: &[&str] = &["cmd", "shift", "z"];
    pub const FIND_REPLACE: &[&str] = &["cmd", "alt", "f"];
    pub const ADDRESS_BAR: &[&str] = &["cmd", "l"];
    pub const NEW_TAB: &[&str] = &["cmd", "t"];
    pub const CLOSE_TAB: &[&str] = &["cmd", "w"];
    pub const NEXT_TAB: &[&str] = &["ctrl", "tab"];
    pub const BACK: &[&str] = &["cmd", "["];
    pub const FORWARD: &[&str] = &["cmd", "]"];
    pub const REFRESH: &[&str] = &["cmd", "r"];
    pub const BOOKMARK: &[&str] = &["cmd", "d"];
    pub const FIND: &[&str] = &["cmd", "f"];
    pub const OPEN_FILE: &[&str] = &["cmd", "o"];
    pub const SAVE: &[&str] = &["cmd", "s"];
    pub const SAVE_AS: &[&str] = &["cmd", "shift", "s"];
    pub const CLOSE_APP: &[&str] = &["cmd", "q"];
    pub const SWITCH_WINDOW: &[&str] = &["cmd", "tab"];
    pub const MINIMIZE: &[&str] = &["cmd", "m"];
    pub const MAXIMIZE: &[&str] = &["ctrl", "cmd", "f"];
    pub const LOCK: &[&str] = &["ctrl", "cmd", "q"];
    pub const APP_LAUNCHER: &[&str] = &["cmd", "space"];
}

pub use table::*;

/// Owned form for [`core_input::KeyboardBackend::chord`].
pub fn chord(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}
