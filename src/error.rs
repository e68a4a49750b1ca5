//! Error taxonomy for the engine
//!
//! Configuration errors are raised by the call that made an illegal binding.
//! Consistency errors indicate an engine bug and are treated as fatal by the
//! daemon. Action faults never leave the activation that produced them.

use crate::hotkey::{ActionKind, Trigger};
use crate::key::Key;
use crate::sync::JobStatus;

/// Illegal binding or command definition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("a hotkey needs a down action, an up action or both")]
    NoAction,

    #[error("stateless key {0} cannot carry an up action")]
    StatelessRelease(Key),

    #[error("stateless key {0} only supports single actions")]
    StatelessNotSingle(Key),

    #[error("{kind} action cannot be bound to key {trigger}")]
    IllegalTrigger { kind: ActionKind, trigger: Trigger },

    #[error("mouse key {0} is not allowed in a command")]
    MouseKeyInCommand(Key),

    #[error("command '{0}' is already defined")]
    DuplicateCommand(String),

    #[error("command sequence cannot be empty")]
    EmptyCommand,

    #[error("invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("unknown key name '{0}'")]
    UnknownKey(String),

    #[error("recording needs end keys or a command container to match against")]
    NoRecordingTerminator,
}

/// Internal invariant violated; signals an engine bug
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    #[error("hotkey {id} on {key} pressed again while already down")]
    ReentrantKeyDown { id: u64, key: Key },

    #[error("hotkey {id} on {key} released again while already up")]
    ReentrantKeyUp { id: u64, key: Key },

    #[error("stateless hotkey {id} on {key} cannot be released")]
    StatelessRelease { id: u64, key: Key },

    #[error("an active hotkey for '{key}' already exists (current priority {current}, new priority {new})")]
    AlreadyCurrent { key: Key, current: i32, new: i32 },

    #[error("hotkey {id} on {key} is not registered")]
    HotkeyNotFound { id: u64, key: Key },

    #[error("{0} is already unlocked")]
    AlreadyUnlocked(String),
}

/// Fault raised inside a user callback
#[derive(Debug, thiserror::Error)]
pub enum ActionFault {
    #[error("action failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("action panicked: {0}")]
    Panicked(String),

    #[error("action task was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("job is already finished ({0:?})")]
    AlreadyFinished(JobStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("timer is already running")]
    AlreadyRunning,
}

/// Errors surfaced by engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::IllegalTrigger {
            kind: ActionKind::Rapid,
            trigger: Trigger::Up,
        };
        assert_eq!(err.to_string(), "rapid action cannot be bound to key release");

        let err: EngineError = ConsistencyError::HotkeyNotFound { id: 7, key: Key::A }.into();
        assert_eq!(err.to_string(), "hotkey 7 on A is not registered");
    }

    #[test]
    fn test_fault_formats_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("saving clip");
        let fault = ActionFault::Failed(inner);
        assert_eq!(fault.to_string(), "action failed: saving clip: disk full");
    }
}
