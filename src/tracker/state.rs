//! Physical and virtual key state tracking
//!
//! The real down set only changes on actual transitions of physical input;
//! auto-repeat presses leave it and the state versions untouched. The
//! virtual set mirrors what the OS believes is down, including injected
//! input and excluding blocked events.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use super::history::{History, KeyState};
use crate::key::Key;

#[derive(Debug)]
pub struct KeyTracker {
    down: HashSet<Key>,
    down_virtual: HashSet<Key>,
    /// Bumped on every real transition of a stateful key
    versions: HashMap<Key, u64>,
    /// Global arrival id of each key's latest transition
    global_ids: HashMap<Key, u64>,
    global_id: u64,
    history: History<KeyState>,
    last_keyboard: Instant,
    last_mouse: Instant,
}

impl KeyTracker {
    pub fn new(history_size: usize) -> Self {
        let now = Instant::now();
        Self {
            down: HashSet::new(),
            down_virtual: HashSet::new(),
            versions: HashMap::new(),
            global_ids: HashMap::new(),
            global_id: 0,
            history: History::new(history_size),
            last_keyboard: now,
            last_mouse: now,
        }
    }

    /// Whether `key` is physically down; modifier flags match either side
    pub fn is_down(&self, key: Key) -> bool {
        Self::contains(&self.down, key)
    }

    /// Whether `key` is down as far as the OS knows
    pub fn is_down_virtual(&self, key: Key) -> bool {
        Self::contains(&self.down_virtual, key)
    }

    fn contains(set: &HashSet<Key>, key: Key) -> bool {
        if key.is_modifier_flag() {
            key.modifier_variants().iter().any(|k| set.contains(k))
        } else {
            set.contains(&key)
        }
    }

    /// Record a real transition.
    ///
    /// Returns false for auto-repeat presses and stateless releases, which
    /// do not change state.
    pub fn record(&mut self, key: Key, pressed: bool) -> bool {
        if pressed == self.is_down(key) {
            return false;
        }

        if !key.is_stateless() {
            *self.versions.entry(key).or_insert(0) += 1;
            if pressed {
                self.down.insert(key);
            } else {
                self.down.remove(&key);
            }
        }

        self.history.push(KeyState::new(key, pressed));
        self.global_id += 1;
        self.global_ids.insert(key, self.global_id);
        true
    }

    pub fn set_virtual(&mut self, key: Key, pressed: bool) {
        if key.is_stateless() {
            return;
        }
        if pressed {
            self.down_virtual.insert(key);
        } else {
            self.down_virtual.remove(&key);
        }
    }

    /// Refresh the idle timer of the key's input class
    pub fn touch(&mut self, key: Key) {
        if key.is_mouse() {
            self.last_mouse = Instant::now();
        } else {
            self.last_keyboard = Instant::now();
        }
    }

    pub fn state_version(&self, key: Key) -> u64 {
        self.versions.get(&key).copied().unwrap_or(0)
    }

    /// Whether `key` changed state since `version` was taken
    pub fn has_changed(&self, key: Key, version: u64) -> bool {
        self.state_version(key) > version
    }

    pub fn global_id(&self, key: Key) -> u64 {
        self.global_ids.get(&key).copied().unwrap_or(0)
    }

    pub fn current_global_id(&self) -> u64 {
        self.global_id
    }

    pub fn history(&self) -> Vec<KeyState> {
        self.history.iter().copied().collect()
    }

    pub fn key_count(&self) -> usize {
        self.down.len()
    }

    pub fn key_count_virtual(&self) -> usize {
        self.down_virtual.len()
    }

    pub fn down_keys_virtual(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.down_virtual.iter().copied().collect();
        keys.sort();
        keys
    }

    pub fn reset_virtual(&mut self) {
        self.down_virtual.clear();
    }

    pub fn keyboard_idle(&self) -> Duration {
        self.last_keyboard.elapsed()
    }

    pub fn mouse_idle(&self) -> Duration {
        self.last_mouse.elapsed()
    }

    pub fn idle(&self) -> Duration {
        self.keyboard_idle().min(self.mouse_idle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_bump_version_and_history() {
        let mut tracker = KeyTracker::new(10);
        assert!(tracker.record(Key::A, true));
        assert!(tracker.is_down(Key::A));
        assert_eq!(tracker.state_version(Key::A), 1);

        assert!(tracker.record(Key::A, false));
        assert_eq!(tracker.state_version(Key::A), 2);
        assert_eq!(
            tracker.history(),
            vec![KeyState::new(Key::A, false), KeyState::new(Key::A, true)]
        );
    }

    #[test]
    fn test_auto_repeat_is_not_a_change() {
        let mut tracker = KeyTracker::new(10);
        tracker.record(Key::B, true);
        assert!(!tracker.record(Key::B, true));
        assert_eq!(tracker.state_version(Key::B), 1);
        assert_eq!(tracker.history().len(), 1);
        assert!(!tracker.has_changed(Key::B, 1));
        assert!(tracker.has_changed(Key::B, 0));
    }

    #[test]
    fn test_stateless_keys_never_stay_down() {
        let mut tracker = KeyTracker::new(10);
        assert!(tracker.record(Key::WheelUp, true));
        assert!(!tracker.is_down(Key::WheelUp));
        assert_eq!(tracker.state_version(Key::WheelUp), 0);
        assert!(!tracker.record(Key::WheelUp, false));
        assert_eq!(tracker.current_global_id(), 1);
    }

    #[test]
    fn test_modifier_flag_resolves_either_side() {
        let mut tracker = KeyTracker::new(10);
        assert!(!tracker.is_down(Key::Shift));
        tracker.record(Key::RShift, true);
        assert!(tracker.is_down(Key::Shift));
        assert!(!tracker.is_down(Key::LShift));

        tracker.set_virtual(Key::LCtrl, true);
        assert!(tracker.is_down_virtual(Key::Ctrl));
        assert!(!tracker.is_down(Key::Ctrl));
    }

    #[test]
    fn test_global_ids_follow_arrival_order() {
        let mut tracker = KeyTracker::new(10);
        tracker.record(Key::A, true);
        tracker.record(Key::B, true);
        assert!(tracker.global_id(Key::B) > tracker.global_id(Key::A));
    }
}
