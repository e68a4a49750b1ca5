//! Outbound seam to the OS input injection layer

use crate::key::Key;

/// Synthesizes key events on behalf of the engine.
///
/// Implementations should mark what they send as injected so the events
/// come back through the funnel as virtual-only updates.
pub trait KeySender: Send + Sync {
    fn send(&self, key: Key, pressed: bool);
}
