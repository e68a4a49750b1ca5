//! Bounded drop-oldest history of key transitions

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::key::Key;

/// An immutable key transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyState {
    pub key: Key,
    pub pressed: bool,
}

impl KeyState {
    pub fn new(key: Key, pressed: bool) -> Self {
        Self { key, pressed }
    }
}

/// Ring buffer that keeps the newest `capacity` entries.
///
/// Indexing is newest first: `get(0)` is the latest push.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(item);
    }

    /// Remove and return the newest entry
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        let len = self.entries.len();
        if index >= len {
            return None;
        }
        self.entries.get(len - 1 - index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_indexing() {
        let mut history = History::new(3);
        history.push(1);
        history.push(2);
        assert_eq!(history.get(0), Some(&2));
        assert_eq!(history.get(1), Some(&1));
        assert_eq!(history.get(2), None);
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
    }

    #[test]
    fn test_pop_returns_newest() {
        let mut history = History::new(2);
        history.push(KeyState::new(Key::A, true));
        history.push(KeyState::new(Key::A, false));
        assert_eq!(history.pop(), Some(KeyState::new(Key::A, false)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = History::new(0);
        history.push(1);
        assert!(history.is_empty());
    }
}
