//! Virtual key definitions and capability predicates
//!
//! `Key` is a closed set of keyboard and mouse symbols. Predicates classify
//! keys for the tracker (stateless, mouse, media) and for modifier matching
//! (physical modifiers vs the either-side flags `Shift`, `Ctrl`, `Alt`, `Win`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

macro_rules! define_keys {
    ($($(#[$meta:meta])* $variant:ident),* $(,)?) => {
        /// A physical or virtual input symbol
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub enum Key {
            $($(#[$meta])* $variant),*
        }

        impl Key {
            /// Every defined key, in declaration order
            pub const ALL: &'static [Key] = &[$(Key::$variant),*];

            /// Canonical name of the key
            pub fn name(self) -> &'static str {
                match self {
                    $(Key::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

define_keys! {
    /// Unknown or unmapped input
    #[default]
    None,

    // Mouse buttons
    LButton, RButton, MButton, XButton1, XButton2,

    // Stateless mouse input
    WheelUp, WheelDown, WheelLeft, WheelRight, MouseMove,

    // Physical modifiers
    LShift, RShift, LCtrl, RCtrl, LAlt, RAlt, LWin, RWin,

    // Either-side modifier flags
    Shift, Ctrl, Alt, Win,

    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Digit row
    D0, D1, D2, D3, D4, D5, D6, D7, D8, D9,

    // Function keys
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    F13, F14, F15, F16, F17, F18, F19, F20, F21, F22, F23, F24,

    // Editing and whitespace
    Enter, Escape, Backspace, Tab, Space, CapsLock, Insert, Delete,
    Home, End, PageUp, PageDown, Left, Right, Up, Down,
    PrintScreen, ScrollLock, Pause, Apps, NumLock,

    // Punctuation
    Minus, Equals, LBracket, RBracket, Backslash, Semicolon, Quote,
    Comma, Period, Slash, Grave,

    // Numpad (numlock on)
    Numpad0, Numpad1, Numpad2, Numpad3, Numpad4,
    Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    NumpadDot, NumpadEnter, NumpadAdd, NumpadSub, NumpadMult, NumpadDiv,

    // Numpad (numlock off navigation variants)
    NumpadIns, NumpadEnd, NumpadDown, NumpadPgDn, NumpadLeft,
    NumpadClear, NumpadRight, NumpadHome, NumpadUp, NumpadPgUp, NumpadDel,

    // Media
    VolumeUp, VolumeDown, VolumeMute, MediaNext, MediaPrev, MediaStop, MediaPlayPause,

    /// Unassigned key, sent to swallow Win/Alt menu activation
    NoMapping,
}

/// The eight physical modifier keys
pub const PHYSICAL_MODIFIERS: [Key; 8] = [
    Key::LShift,
    Key::RShift,
    Key::LCtrl,
    Key::RCtrl,
    Key::LAlt,
    Key::RAlt,
    Key::LWin,
    Key::RWin,
];

impl Key {
    pub fn is_unknown(self) -> bool {
        self == Key::None
    }

    pub fn is_mouse(self) -> bool {
        matches!(
            self,
            Key::LButton
                | Key::RButton
                | Key::MButton
                | Key::XButton1
                | Key::XButton2
                | Key::WheelUp
                | Key::WheelDown
                | Key::WheelLeft
                | Key::WheelRight
                | Key::MouseMove
        )
    }

    /// Keys without a meaningful release transition
    pub fn is_stateless(self) -> bool {
        matches!(
            self,
            Key::WheelUp | Key::WheelDown | Key::WheelLeft | Key::WheelRight | Key::MouseMove
        )
    }

    /// Physical modifier or either-side modifier flag
    pub fn is_modifier(self) -> bool {
        PHYSICAL_MODIFIERS.contains(&self) || self.is_modifier_flag()
    }

    pub fn is_modifier_flag(self) -> bool {
        matches!(self, Key::Shift | Key::Ctrl | Key::Alt | Key::Win)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Key::Shift | Key::LShift | Key::RShift)
    }

    pub fn is_ctrl(self) -> bool {
        matches!(self, Key::Ctrl | Key::LCtrl | Key::RCtrl)
    }

    pub fn is_alt(self) -> bool {
        matches!(self, Key::Alt | Key::LAlt | Key::RAlt)
    }

    pub fn is_win(self) -> bool {
        matches!(self, Key::Win | Key::LWin | Key::RWin)
    }

    pub fn is_media(self) -> bool {
        matches!(
            self,
            Key::VolumeUp
                | Key::VolumeDown
                | Key::VolumeMute
                | Key::MediaNext
                | Key::MediaPrev
                | Key::MediaStop
                | Key::MediaPlayPause
        )
    }

    pub fn is_numpad(self) -> bool {
        (Key::Numpad0..=Key::NumpadDel).contains(&self)
    }

    /// Physical keys a modifier stands for.
    ///
    /// A flag expands to both sides, a physical modifier to itself and any
    /// other key to nothing.
    pub fn modifier_variants(self) -> &'static [Key] {
        match self {
            Key::Shift => &[Key::LShift, Key::RShift],
            Key::Ctrl => &[Key::LCtrl, Key::RCtrl],
            Key::Alt => &[Key::LAlt, Key::RAlt],
            Key::Win => &[Key::LWin, Key::RWin],
            Key::LShift => &[Key::LShift],
            Key::RShift => &[Key::RShift],
            Key::LCtrl => &[Key::LCtrl],
            Key::RCtrl => &[Key::RCtrl],
            Key::LAlt => &[Key::LAlt],
            Key::RAlt => &[Key::RAlt],
            Key::LWin => &[Key::LWin],
            Key::RWin => &[Key::RWin],
            _ => &[],
        }
    }

    /// Map a numlock-off navigation variant onto its numeric counterpart
    pub fn map_numpad(self) -> Key {
        match self {
            Key::NumpadIns => Key::Numpad0,
            Key::NumpadEnd => Key::Numpad1,
            Key::NumpadDown => Key::Numpad2,
            Key::NumpadPgDn => Key::Numpad3,
            Key::NumpadLeft => Key::Numpad4,
            Key::NumpadClear => Key::Numpad5,
            Key::NumpadRight => Key::Numpad6,
            Key::NumpadHome => Key::Numpad7,
            Key::NumpadUp => Key::Numpad8,
            Key::NumpadPgUp => Key::Numpad9,
            Key::NumpadDel => Key::NumpadDot,
            other => other,
        }
    }

    /// Key typed by a single command character (letters and digits only)
    pub fn from_char(c: char) -> Option<Key> {
        if c.is_ascii_digit() {
            return format!("D{c}").parse().ok();
        }
        if c.is_ascii_alphabetic() {
            return c.to_string().parse().ok();
        }
        None
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = ConfigError;

    /// Case-insensitive lookup by name; accepts `control` for `ctrl`,
    /// `esc`/`return` aliases and bare digits for the digit row.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let normalized = match lowered.as_str() {
            "esc" => "escape".to_string(),
            "return" => "enter".to_string(),
            "del" => "delete".to_string(),
            digit if digit.len() == 1 && digit.as_bytes()[0].is_ascii_digit() => {
                format!("d{digit}")
            }
            other => other.replace("control", "ctrl"),
        };

        Key::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stateless_keys_are_mouse() {
        for key in Key::ALL.iter().filter(|k| k.is_stateless()) {
            assert!(key.is_mouse(), "{key} should be a mouse key");
        }
        assert!(!Key::LButton.is_stateless());
    }

    #[test]
    fn test_modifier_classification() {
        assert!(Key::Shift.is_modifier_flag());
        assert!(Key::LShift.is_modifier());
        assert!(!Key::LShift.is_modifier_flag());
        assert!(Key::RAlt.is_alt());
        assert!(!Key::A.is_modifier());
        assert_eq!(Key::Win.modifier_variants(), &[Key::LWin, Key::RWin]);
        assert!(Key::A.modifier_variants().is_empty());
    }

    #[test]
    fn test_numpad_mapping() {
        assert!(Key::NumpadPgUp.is_numpad());
        assert!(!Key::NumLock.is_numpad());
        assert_eq!(Key::NumpadHome.map_numpad(), Key::Numpad7);
        assert_eq!(Key::NumpadDel.map_numpad(), Key::NumpadDot);
        assert_eq!(Key::Numpad4.map_numpad(), Key::Numpad4);
        assert_eq!(Key::A.map_numpad(), Key::A);
    }

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("enter".parse::<Key>().unwrap(), Key::Enter);
        assert_eq!("LControl".parse::<Key>().unwrap(), Key::LCtrl);
        assert_eq!("esc".parse::<Key>().unwrap(), Key::Escape);
        assert_eq!("7".parse::<Key>().unwrap(), Key::D7);
        assert!(matches!(
            "nope".parse::<Key>(),
            Err(ConfigError::UnknownKey(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_from_char() {
        assert_eq!(Key::from_char('h'), Some(Key::H));
        assert_eq!(Key::from_char('3'), Some(Key::D3));
        assert_eq!(Key::from_char('!'), None);
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&Key::NumpadEnter).unwrap();
        assert_eq!(json, "\"NumpadEnter\"");
        let key: Key = serde_json::from_str("\"LWin\"").unwrap();
        assert_eq!(key, Key::LWin);
    }
}
