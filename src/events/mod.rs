//! Input events published by the engine and the daemon's wire format
//!
//! `InputEvent` is broadcast to observers for every real input event.
//! `RawInput` and `Decision` are the JSON lines the daemon reads and writes.

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// A real (non-injected) input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Key or button transition, including auto-repeat presses
    Key { key: Key, pressed: bool },

    /// Mouse movement
    MouseMove,
}

impl std::fmt::Display for InputEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputEvent::Key { key, pressed: true } => write!(f, "{key} DOWN"),
            InputEvent::Key { key, pressed: false } => write!(f, "{key} UP"),
            InputEvent::MouseMove => write!(f, "MOUSE_MOVE"),
        }
    }
}

/// One event as delivered by the input hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RawInput {
    pub key: Key,
    pub pressed: bool,

    /// Synthesized by software rather than a device
    #[serde(default)]
    pub injected: bool,

    /// Hook-provided extra data; carries the sender's process id for
    /// injected media keys
    #[serde(default)]
    pub extra_info: usize,
}

/// Whether an event should be withheld from other applications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub key: Key,
    pub pressed: bool,
    pub block: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = InputEvent::Key {
            key: Key::A,
            pressed: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"key""#));
        assert!(json.contains(r#""key":"A""#));
        assert_eq!(event.to_string(), "A DOWN");
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"mouse_move"}"#;
        let event: InputEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, InputEvent::MouseMove);
    }

    #[test]
    fn test_raw_input_defaults() {
        let raw: RawInput = serde_json::from_str(r#"{"key":"F5","pressed":false}"#).unwrap();
        assert_eq!(raw.key, Key::F5);
        assert!(!raw.injected);
        assert_eq!(raw.extra_info, 0);
    }

    #[test]
    fn test_decision_serialization() {
        let decision = Decision {
            key: Key::Escape,
            pressed: true,
            block: true,
        };
        assert_eq!(
            serde_json::to_string(&decision).unwrap(),
            r#"{"key":"Escape","pressed":true,"block":true}"#
        );
    }
}
