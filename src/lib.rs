//! Global hotkey engine
//!
//! Ingests a system-wide stream of raw keyboard and mouse transitions,
//! decides which registered hotkey should fire using priority, modifier and
//! context rules, and runs its action with single, rapid, repeat, hold or
//! double semantics. The OS hook is whoever calls
//! [`Engine::record_input`]; injection goes through [`KeySender`].

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod key;
pub mod lifecycle;
pub mod sync;
pub mod tracker;

pub use command::{CommandContainer, RecordOptions};
pub use config::Config;
pub use engine::{Activity, Engine, InputLock, KeySender};
pub use error::{ActionFault, ConfigError, ConsistencyError, EngineError, Result};
pub use events::{Decision, InputEvent, RawInput};
pub use hotkey::{
    ActionContext, Callback, HAction, Hotkey, HotkeyBuilder, HotkeyHandle, HotkeyProfile, Trigger,
    TriggerKey,
};
pub use key::Key;
pub use sync::{Gate, Job, JobStatus, Timer};
pub use tracker::{KeyState, LockKind};
