//! Protocol key-name resolution.
//!
//! Protocols name keys with lowercase strings (`"enter"`, `"ctrl"`, `"f5"`,
//! or any single character). This module maps those to `enigo::Key` and
//! classifies modifiers so chords press modifiers first and release them in
//! reverse order.

use crate::InputError;
use enigo::Key;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u8 {
        const CTRL  = 1;
        const ALT   = 2;
        const SHIFT = 4;
        const META  = 8;
    }
}

impl ModMask {
    /// Modifier keys in canonical press order.
    pub fn keys(self) -> Vec<Key> {
        let mut out = Vec::new();
        if self.contains(ModMask::CTRL) {
            out.push(Key::Control);
        }
        if self.contains(ModMask::ALT) {
            out.push(Key::Alt);
        }
        if self.contains(ModMask::SHIFT) {
            out.push(Key::Shift);
        }
        if self.contains(ModMask::META) {
            out.push(Key::Meta);
        }
        out
    }
}

/// A parsed key combination: modifier mask plus the non-modifier keys in
/// the order they appeared.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChord {
    pub mods: ModMask,
    pub keys: Vec<Key>,
}

pub fn modifier_mask(name: &str) -> Option<ModMask> {
    match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(ModMask::CTRL),
        "alt" | "option" => Some(ModMask::ALT),
        "shift" => Some(ModMask::SHIFT),
        "meta" | "win" | "super" | "cmd" | "command" => Some(ModMask::META),
        _ => None,
    }
}

pub fn parse_key_name(name: &str) -> Result<Key, InputError> {
    let lower = name.to_ascii_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Return,
        "esc" | "escape" => Key::Escape,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "capslock" => Key::CapsLock,
        "ctrl" | "control" => Key::Control,
        "alt" | "option" => Key::Alt,
        "shift" => Key::Shift,
        "meta" | "win" | "super" | "cmd" | "command" => Key::Meta,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        // Windows exposes real volume virtual keys; elsewhere the system
        // actions use platform commands instead.
        #[cfg(target_os = "windows")]
        "volumeup" => Key::VolumeUp,
        #[cfg(target_os = "windows")]
        "volumedown" => Key::VolumeDown,
        #[cfg(target_os = "windows")]
        "volumemute" => Key::VolumeMute,
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return Err(InputError::UnknownKey(name.to_string())),
            }
        }
    };
    Ok(key)
}

/// Parse the parts of a `shortcut` action. Accepts both the list form
/// (`["ctrl", "shift", "t"]`) and a single `+`-joined string (`"ctrl+t"`),
/// which callers split before reaching here.
pub fn parse_chord(parts: &[String]) -> Result<KeyChord, InputError> {
    let mut mods = ModMask::empty();
    let mut keys = Vec::new();
    for part in parts {
        if let Some(mask) = modifier_mask(part) {
            mods |= mask;
        } else {
            keys.push(parse_key_name(part)?);
        }
    }
    Ok(KeyChord { mods, keys })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_resolve() {
        assert_eq!(parse_key_name("enter").unwrap(), Key::Return);
        assert_eq!(parse_key_name("Escape").unwrap(), Key::Escape);
        assert_eq!(parse_key_name("f11").unwrap(), Key::F11);
        assert_eq!(parse_key_name("a").unwrap(), Key::Unicode('a'));
        assert_eq!(parse_key_name("/").unwrap(), Key::Unicode('/'));
    }

    #[test]
    fn multi_char_unknown_name_is_rejected() {
        assert!(matches!(
            parse_key_name("hyperspace"),
            Err(InputError::UnknownKey(_))
        ));
    }

    #[test]
    fn chord_splits_modifiers_from_keys() {
        let chord = parse_chord(&[
            "ctrl".to_string(),
            "shift".to_string(),
            "t".to_string(),
        ])
        .unwrap();
        assert_eq!(chord.mods, ModMask::CTRL | ModMask::SHIFT);
        assert_eq!(chord.keys, vec![Key::Unicode('t')]);
        assert_eq!(chord.mods.keys(), vec![Key::Control, Key::Shift]);
    }

    #[test]
    fn meta_aliases() {
        for alias in ["meta", "win", "cmd", "super", "command"] {
            assert_eq!(modifier_mask(alias), Some(ModMask::META), "{alias}");
        }
    }
}
