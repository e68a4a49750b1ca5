//! Named bundles of hotkey registrations

use crate::engine::Engine;
use crate::error::Result;

/// A set of hotkeys registered together.
///
/// Profiles flagged as debug are only loaded when the engine runs with
/// debug profiles enabled, and the others only when it does not.
pub trait HotkeyProfile: Send + Sync {
    fn name(&self) -> &str;

    fn debug(&self) -> bool {
        false
    }

    fn create(&self, engine: &Engine) -> Result<()>;
}
