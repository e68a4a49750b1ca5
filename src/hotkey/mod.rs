//! Hotkey definitions, activation and resolution order
//!
//! A hotkey binds a [`TriggerKey`] to an optional press action and an
//! optional release action. Hotkeys on the same main key are grouped and
//! ordered by packed priority, then by recency.

mod action;
mod group;
mod machine;
mod profile;
mod registry;
mod trigger;

pub use action::{ActionContext, ActionKind, BoxFuture, Callback, HAction, Trigger};
pub use group::HotkeyGroup;
pub use machine::{Context, Hotkey, HotkeyBuilder, HotkeyHandle};
pub use profile::HotkeyProfile;
pub use registry::{pack_priority, unpack_priority, Registry};
pub use trigger::TriggerKey;
