//! Reference-counted input locks
//!
//! Each lock kind keeps a counter; input matching any held lock is blocked
//! from reaching the OS.

use std::collections::HashMap;
use std::fmt;

use crate::error::ConsistencyError;
use crate::key::Key;

/// Which input a lock covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockKind {
    /// All user input
    All,
    /// All mouse input
    Mouse,
    /// All keyboard input
    Keyboard,
    /// All keys and buttons, but not mouse movement
    AllKeys,
    /// Mouse movement only
    MouseMove,
    /// Specific keys
    Keys(Vec<Key>),
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::All => write!(f, "input"),
            LockKind::Mouse => write!(f, "mouse"),
            LockKind::Keyboard => write!(f, "keyboard"),
            LockKind::AllKeys => write!(f, "all keys"),
            LockKind::MouseMove => write!(f, "mouse move"),
            LockKind::Keys(keys) => write!(f, "keys {keys:?}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct InputLocks {
    all: u32,
    mouse: u32,
    keyboard: u32,
    all_keys: u32,
    mouse_move: u32,
    keys: HashMap<Key, u32>,
}

impl InputLocks {
    pub fn acquire(&mut self, kind: &LockKind) {
        match kind {
            LockKind::All => self.all += 1,
            LockKind::Mouse => self.mouse += 1,
            LockKind::Keyboard => self.keyboard += 1,
            LockKind::AllKeys => self.all_keys += 1,
            LockKind::MouseMove => self.mouse_move += 1,
            LockKind::Keys(keys) => {
                for key in keys {
                    *self.keys.entry(*key).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn release(&mut self, kind: &LockKind) -> Result<(), ConsistencyError> {
        let unlocked = || ConsistencyError::AlreadyUnlocked(kind.to_string());
        match kind {
            LockKind::All => decrement(&mut self.all).ok_or_else(unlocked),
            LockKind::Mouse => decrement(&mut self.mouse).ok_or_else(unlocked),
            LockKind::Keyboard => decrement(&mut self.keyboard).ok_or_else(unlocked),
            LockKind::AllKeys => decrement(&mut self.all_keys).ok_or_else(unlocked),
            LockKind::MouseMove => decrement(&mut self.mouse_move).ok_or_else(unlocked),
            LockKind::Keys(keys) => {
                if let Some(key) = keys.iter().find(|key| self.key_count(**key) == 0) {
                    return Err(ConsistencyError::AlreadyUnlocked(format!("key {key}")));
                }
                for key in keys {
                    if let Some(count) = self.keys.get_mut(key) {
                        *count -= 1;
                        if *count == 0 {
                            self.keys.remove(key);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn key_count(&self, key: Key) -> u32 {
        self.keys.get(&key).copied().unwrap_or(0)
    }

    pub fn is_locked(&self) -> bool {
        self.all > 0
    }

    pub fn is_key_locked(&self, key: Key) -> bool {
        self.key_count(key) > 0
    }

    /// Whether a key or button event must be blocked
    pub fn blocks(&self, key: Key) -> bool {
        let class_locked = if key.is_mouse() {
            self.mouse > 0
        } else {
            self.keyboard > 0
        };
        self.all > 0 || self.all_keys > 0 || class_locked || self.is_key_locked(key)
    }

    /// Whether a mouse move event must be blocked
    pub fn blocks_move(&self) -> bool {
        self.all > 0 || self.mouse > 0 || self.mouse_move > 0
    }

    /// Forget every specific-key lock
    pub fn reset_keys(&mut self) {
        self.keys.clear();
    }
}

fn decrement(count: &mut u32) -> Option<()> {
    *count = count.checked_sub(1)?;
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_lock_spares_mouse() {
        let mut locks = InputLocks::default();
        locks.acquire(&LockKind::Keyboard);
        assert!(locks.blocks(Key::A));
        assert!(!locks.blocks(Key::LButton));
        assert!(!locks.blocks_move());
    }

    #[test]
    fn test_all_keys_lock_spares_move() {
        let mut locks = InputLocks::default();
        locks.acquire(&LockKind::AllKeys);
        assert!(locks.blocks(Key::A));
        assert!(locks.blocks(Key::RButton));
        assert!(!locks.blocks_move());

        locks.acquire(&LockKind::MouseMove);
        assert!(locks.blocks_move());
    }

    #[test]
    fn test_counts_are_reference_counted() {
        let mut locks = InputLocks::default();
        locks.acquire(&LockKind::All);
        locks.acquire(&LockKind::All);
        locks.release(&LockKind::All).unwrap();
        assert!(locks.is_locked());
        locks.release(&LockKind::All).unwrap();
        assert!(!locks.is_locked());
        assert_eq!(
            locks.release(&LockKind::All),
            Err(ConsistencyError::AlreadyUnlocked("input".to_string()))
        );
    }

    #[test]
    fn test_key_locks() {
        let mut locks = InputLocks::default();
        let kind = LockKind::Keys(vec![Key::A, Key::B]);
        locks.acquire(&kind);
        assert!(locks.blocks(Key::B));
        assert!(!locks.blocks(Key::C));

        locks.release(&LockKind::Keys(vec![Key::A])).unwrap();
        assert!(!locks.is_key_locked(Key::A));
        assert!(matches!(
            locks.release(&kind),
            Err(ConsistencyError::AlreadyUnlocked(_))
        ));
        assert!(locks.is_key_locked(Key::B));
    }
}
