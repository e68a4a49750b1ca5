//! Hotkeys sharing one main key, ordered for resolution

use std::collections::BTreeMap;
use std::sync::Arc;

use super::machine::Hotkey;
use super::registry::pack_priority;
use crate::key::Key;

/// Priority buckets of LIFO stacks.
///
/// Buckets iterate in ascending packed order (highest priority first);
/// within a bucket the most recently added hotkey comes first.
#[derive(Debug)]
pub struct HotkeyGroup {
    key: Key,
    buckets: BTreeMap<u64, Vec<Arc<Hotkey>>>,
}

impl HotkeyGroup {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            buckets: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn contains(&self, id: u64) -> bool {
        self.iter().any(|hotkey| hotkey.id() == id)
    }

    /// Push onto the bucket for the hotkey's current priority.
    /// Returns false if it is already in the group.
    pub fn add(&mut self, hotkey: Arc<Hotkey>) -> bool {
        if self.contains(hotkey.id()) {
            return false;
        }
        let packed = pack_priority(hotkey.priority(), hotkey.sub_priority() > 0);
        self.buckets.entry(packed).or_default().push(hotkey);
        true
    }

    pub fn remove(&mut self, id: u64) -> Option<Arc<Hotkey>> {
        let (packed, index) = self.buckets.iter().find_map(|(packed, stack)| {
            stack
                .iter()
                .position(|hotkey| hotkey.id() == id)
                .map(|index| (*packed, index))
        })?;

        let stack = self.buckets.get_mut(&packed)?;
        let hotkey = stack.remove(index);
        if stack.is_empty() {
            self.buckets.remove(&packed);
        }
        Some(hotkey)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Hotkey>> {
        self.buckets.values().flat_map(|stack| stack.iter().rev())
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
