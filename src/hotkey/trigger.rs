//! Key combinations that arm a hotkey

use std::fmt;

use crate::key::{Key, PHYSICAL_MODIFIERS};

/// A main key plus the modifiers that must be held for it to trigger
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerKey {
    main: Key,
    modifiers: Vec<Key>,
}

impl TriggerKey {
    pub fn new(main: Key) -> Self {
        Self {
            main,
            modifiers: Vec::new(),
        }
    }

    /// Add required modifiers, keeping insertion order and skipping duplicates
    pub fn with(mut self, modifiers: impl IntoIterator<Item = Key>) -> Self {
        for key in modifiers {
            if !self.modifiers.contains(&key) {
                self.modifiers.push(key);
            }
        }
        self
    }

    pub fn ctrl(main: Key) -> Self {
        Self::new(main).with([Key::Ctrl])
    }

    pub fn shift(main: Key) -> Self {
        Self::new(main).with([Key::Shift])
    }

    pub fn alt(main: Key) -> Self {
        Self::new(main).with([Key::Alt])
    }

    pub fn win(main: Key) -> Self {
        Self::new(main).with([Key::Win])
    }

    pub fn main_key(&self) -> Key {
        self.main
    }

    pub fn modifiers(&self) -> &[Key] {
        &self.modifiers
    }

    /// Physical modifiers that must be up for a non-wild hotkey.
    ///
    /// All eight physical modifiers minus the ones the required modifiers
    /// stand for; a flag covers both sides, a physical key only itself.
    pub fn negative_modifiers(&self) -> Vec<Key> {
        PHYSICAL_MODIFIERS
            .iter()
            .copied()
            .filter(|candidate| {
                !self
                    .modifiers
                    .iter()
                    .any(|required| required.modifier_variants().contains(candidate))
            })
            .collect()
    }
}

impl From<Key> for TriggerKey {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

impl Key {
    /// Combine this key with required modifiers
    pub fn with(self, modifiers: impl IntoIterator<Item = Key>) -> TriggerKey {
        TriggerKey::new(self).with(modifiers)
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{modifier}+")?;
        }
        write!(f, "{}", self.main)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let trigger = Key::A.with([Key::Ctrl, Key::Shift]);
        assert_eq!(trigger.to_string(), "Ctrl+Shift+A");
        assert_eq!(TriggerKey::from(Key::F5).to_string(), "F5");
    }

    #[test]
    fn test_duplicate_modifiers_are_ignored() {
        let trigger = TriggerKey::ctrl(Key::C).with([Key::Ctrl, Key::Alt]);
        assert_eq!(trigger.modifiers(), &[Key::Ctrl, Key::Alt]);
    }

    #[test]
    fn test_negative_modifiers_without_requirements() {
        let trigger = TriggerKey::new(Key::A);
        assert_eq!(trigger.negative_modifiers(), PHYSICAL_MODIFIERS.to_vec());
    }

    #[test]
    fn test_flag_excludes_both_sides() {
        let negatives = TriggerKey::shift(Key::A).negative_modifiers();
        assert_eq!(negatives.len(), 6);
        assert!(!negatives.contains(&Key::LShift));
        assert!(!negatives.contains(&Key::RShift));
    }

    #[test]
    fn test_physical_modifier_excludes_only_itself() {
        let negatives = Key::A.with([Key::LCtrl]).negative_modifiers();
        assert!(!negatives.contains(&Key::LCtrl));
        assert!(negatives.contains(&Key::RCtrl));
    }
}
