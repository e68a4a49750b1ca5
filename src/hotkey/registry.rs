//! Registered hotkeys indexed by main key

use std::collections::HashMap;
use std::sync::Arc;

use super::group::HotkeyGroup;
use super::machine::Hotkey;
use crate::error::ConsistencyError;
use crate::key::Key;

/// Pack a priority and a tiebreak flag into an ascending sort key.
///
/// Lower packed values resolve first: higher priorities, then, within equal
/// priority, hotkeys that carry modifiers or a context.
pub fn pack_priority(priority: i32, tiebreak: bool) -> u64 {
    let inverted = (i32::MAX as i64 - priority as i64) as u64;
    (inverted << 1) | if tiebreak { 0 } else { 1 }
}

pub fn unpack_priority(packed: u64) -> (i32, bool) {
    let priority = (i32::MAX as i64 - (packed >> 1) as i64) as i32;
    (priority, packed & 1 == 0)
}

#[derive(Debug, Default)]
pub struct Registry {
    groups: HashMap<Key, HotkeyGroup>,
}

impl Registry {
    pub fn add(&mut self, hotkey: Arc<Hotkey>) -> bool {
        let key = hotkey.main_key();
        self.groups
            .entry(key)
            .or_insert_with(|| HotkeyGroup::new(key))
            .add(hotkey)
    }

    pub fn remove(&mut self, hotkey: &Hotkey) -> Result<Arc<Hotkey>, ConsistencyError> {
        let key = hotkey.main_key();
        let not_found = || ConsistencyError::HotkeyNotFound {
            id: hotkey.id(),
            key,
        };

        let group = self.groups.get_mut(&key).ok_or_else(not_found)?;
        let removed = group.remove(hotkey.id()).ok_or_else(not_found)?;
        if group.is_empty() {
            self.groups.remove(&key);
        }
        Ok(removed)
    }

    /// Move a hotkey to the bucket of its new priority, as the most recent entry
    pub fn set_priority(&mut self, hotkey: &Hotkey, priority: i32) -> Result<(), ConsistencyError> {
        let removed = self.remove(hotkey)?;
        removed.store_priority(priority);
        self.add(removed);
        Ok(())
    }

    /// Hotkeys on `key` in resolution order
    pub fn candidates(&self, key: Key) -> Vec<Arc<Hotkey>> {
        self.groups
            .get(&key)
            .map(|group| group.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(HotkeyGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{Callback, HAction, HotkeyBuilder};

    fn hotkey(id: u64, key: Key, priority: i32) -> Arc<Hotkey> {
        let builder = HotkeyBuilder::new(key)
            .priority(priority)
            .on_down(HAction::single(Callback::sync(|_| Ok(()))));
        Arc::new(builder.build(id).unwrap())
    }

    #[test]
    fn test_pack_orders_by_priority_then_tiebreak() {
        assert!(pack_priority(10, false) < pack_priority(0, true));
        assert!(pack_priority(0, true) < pack_priority(0, false));
        assert!(pack_priority(i32::MAX, false) < pack_priority(i32::MIN, true));
    }

    #[test]
    fn test_unpack_is_exact() {
        for priority in [i32::MIN, -7, 0, 1, 1000, i32::MAX] {
            for tiebreak in [true, false] {
                assert_eq!(
                    unpack_priority(pack_priority(priority, tiebreak)),
                    (priority, tiebreak)
                );
            }
        }
    }

    #[test]
    fn test_remove_twice_is_inconsistent() {
        let mut registry = Registry::default();
        let hotkey = hotkey(9, Key::B, 0);
        registry.add(hotkey.clone());
        assert_eq!(registry.len(), 1);

        registry.remove(&hotkey).unwrap();
        assert_eq!(
            registry.remove(&hotkey).err(),
            Some(ConsistencyError::HotkeyNotFound { id: 9, key: Key::B })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_set_priority_rebuckets() {
        let mut registry = Registry::default();
        let low = hotkey(1, Key::A, 0);
        let high = hotkey(2, Key::A, 1);
        registry.add(low.clone());
        registry.add(high.clone());
        assert_eq!(registry.candidates(Key::A)[0].id(), 2);

        registry.set_priority(&low, 2).unwrap();
        assert_eq!(low.priority(), 2);
        assert_eq!(registry.candidates(Key::A)[0].id(), 1);
        assert!(registry.candidates(Key::Z).is_empty());
    }
}
