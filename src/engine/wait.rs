//! Suspend until a key event happens
//!
//! Each wait registers a one-shot waiter that the funnel fires from the
//! event stream. Key waits can block the keys they wait on for their
//! duration; "any key" waits block all keys.

use std::time::Duration;

use tokio::sync::oneshot;

use super::{Engine, InputLock};
use crate::key::Key;
use crate::sync::{with_timeout, Job};
use crate::tracker::{KeyState, KeyTracker, LockKind};

type Predicate = Box<dyn Fn(&KeyState) -> bool + Send>;

pub(crate) struct Waiter {
    predicate: Predicate,
    tx: oneshot::Sender<KeyState>,
}

impl Waiter {
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Consume the waiter if `state` satisfies it, otherwise hand it back
    pub(crate) fn offer(self, state: KeyState) -> Option<Self> {
        if (self.predicate)(&state) {
            let _ = self.tx.send(state);
            None
        } else {
            Some(self)
        }
    }
}

/// Input class for [`Engine::wait_for_activity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Any,
    Keyboard,
    Mouse,
}

impl Activity {
    fn accepts(self, key: Key) -> bool {
        match self {
            Activity::Any => true,
            Activity::Keyboard => !key.is_mouse(),
            Activity::Mouse => key.is_mouse(),
        }
    }
}

/// Whether an event on `actual` counts as an event on `expected`
fn matches_key(expected: Key, actual: Key) -> bool {
    expected == actual || (expected.is_modifier_flag() && expected.modifier_variants().contains(&actual))
}

fn lock_targets(keys: &[Key]) -> Vec<Key> {
    let mut targets = Vec::with_capacity(keys.len());
    for key in keys {
        let expanded: &[Key] = if key.is_modifier_flag() {
            key.modifier_variants()
        } else {
            std::slice::from_ref(key)
        };
        for key in expanded {
            if !targets.contains(key) {
                targets.push(*key);
            }
        }
    }
    targets
}

impl Engine {
    /// Register a waiter unless `ready` already holds.
    ///
    /// Checked under the waiter lock so an event can't slip in between the
    /// check and the registration.
    fn register_waiter(
        &self,
        ready: impl FnOnce(&KeyTracker) -> bool,
        predicate: impl Fn(&KeyState) -> bool + Send + 'static,
    ) -> Option<oneshot::Receiver<KeyState>> {
        let mut waiters = self.inner.waiters.lock();
        let tracker = self.inner.tracker.read();
        if ready(&*tracker) {
            return None;
        }
        drop(tracker);
        let (tx, rx) = oneshot::channel();
        waiters.push(Waiter {
            predicate: Box::new(predicate),
            tx,
        });
        Some(rx)
    }

    async fn await_waiter(rx: oneshot::Receiver<KeyState>, timeout: Option<Duration>) -> Option<KeyState> {
        let job = with_timeout(async move { rx.await.ok() }, timeout).await;
        if job.is_success() {
            job.result()
        } else {
            None
        }
    }

    /// Lock `keys`, with either-side flags locking both physical sides
    fn block_keys(&self, block: bool, keys: &[Key]) -> Option<InputLock> {
        block.then(|| self.lock_input(LockKind::Keys(lock_targets(keys))))
    }

    fn block_all_keys(&self, block: bool) -> Option<InputLock> {
        block.then(|| self.lock_input(LockKind::AllKeys))
    }

    /// Wait for `key` to be down. Returns immediately if it already is.
    pub async fn wait_key_down(&self, key: Key, timeout: Option<Duration>, block: bool) -> bool {
        let _lock = self.block_keys(block, &[key]);
        let predicate = move |state: &KeyState| state.pressed && matches_key(key, state.key);
        match self.register_waiter(|tracker| tracker.is_down(key), predicate) {
            None => true,
            Some(rx) => Self::await_waiter(rx, timeout).await.is_some(),
        }
    }

    /// Wait for `key` to be up. Returns immediately if it already is.
    pub async fn wait_key_up(&self, key: Key, timeout: Option<Duration>, block: bool) -> bool {
        let _lock = self.block_keys(block, &[key]);
        let predicate = move |state: &KeyState| !state.pressed && matches_key(key, state.key);
        match self.register_waiter(|tracker| !tracker.is_down(key), predicate) {
            None => true,
            Some(rx) => Self::await_waiter(rx, timeout).await.is_some(),
        }
    }

    /// Wait for a fresh press of `key`; a key already held must be released first
    pub async fn wait_key(&self, key: Key, timeout: Option<Duration>, block: bool) -> bool {
        if !self.is_down(key) {
            return self.wait_key_down(key, timeout, block).await;
        }

        let started = tokio::time::Instant::now();
        if !self.wait_key_up(key, timeout, block).await {
            return false;
        }
        let remaining = timeout.map(|timeout| timeout.saturating_sub(started.elapsed()));
        self.wait_key_down(key, remaining, block).await
    }

    /// Wait for `key` to change state
    pub async fn wait_key_switch(&self, key: Key, timeout: Option<Duration>, block: bool) -> bool {
        if self.is_down(key) {
            self.wait_key_up(key, timeout, block).await
        } else {
            self.wait_key_down(key, timeout, block).await
        }
    }

    async fn wait_keys(
        &self,
        keys: &[Key],
        timeout: Option<Duration>,
        block: bool,
        accepts: impl Fn(bool) -> bool + Send + 'static,
    ) -> Option<Key> {
        let _lock = self.block_keys(block, keys);
        let keys = keys.to_vec();
        let predicate = move |state: &KeyState| {
            accepts(state.pressed) && keys.iter().any(|key| matches_key(*key, state.key))
        };
        let rx = self.register_waiter(|_| false, predicate)?;
        Self::await_waiter(rx, timeout).await.map(|state| state.key)
    }

    /// Wait for one of `keys` to be pressed
    pub async fn wait_keys_down(&self, keys: &[Key], timeout: Option<Duration>, block: bool) -> Option<Key> {
        self.wait_keys(keys, timeout, block, |pressed| pressed).await
    }

    /// Wait for one of `keys` to be released
    pub async fn wait_keys_up(&self, keys: &[Key], timeout: Option<Duration>, block: bool) -> Option<Key> {
        self.wait_keys(keys, timeout, block, |pressed| !pressed).await
    }

    /// Wait for any event on one of `keys`
    pub async fn wait_keys_switch(&self, keys: &[Key], timeout: Option<Duration>, block: bool) -> Option<Key> {
        self.wait_keys(keys, timeout, block, |_| true).await
    }

    async fn wait_any_key(
        &self,
        timeout: Option<Duration>,
        block: bool,
        accepts: impl Fn(bool) -> bool + Send + 'static,
    ) -> Option<Key> {
        let _lock = self.block_all_keys(block);
        let rx = self.register_waiter(|_| false, move |state: &KeyState| accepts(state.pressed))?;
        Self::await_waiter(rx, timeout).await.map(|state| state.key)
    }

    pub async fn wait_any_key_down(&self, timeout: Option<Duration>, block: bool) -> Option<Key> {
        self.wait_any_key(timeout, block, |pressed| pressed).await
    }

    pub async fn wait_any_key_up(&self, timeout: Option<Duration>, block: bool) -> Option<Key> {
        self.wait_any_key(timeout, block, |pressed| !pressed).await
    }

    pub async fn wait_any_key_switch(&self, timeout: Option<Duration>, block: bool) -> Option<Key> {
        self.wait_any_key(timeout, block, |_| true).await
    }

    /// Wait for the first event accepted by `predicate`.
    ///
    /// The job fails with a default payload on timeout.
    pub async fn wait_key_event(
        &self,
        predicate: impl Fn(&KeyState) -> bool + Send + 'static,
        timeout: Option<Duration>,
    ) -> Job<KeyState> {
        let Some(rx) = self.register_waiter(|_| false, predicate) else {
            return Job::failed(KeyState::default());
        };
        match Self::await_waiter(rx, timeout).await {
            Some(state) => Job::completed(state),
            None => Job::failed(KeyState::default()),
        }
    }

    /// Wait until the user does something on the given input class
    pub async fn wait_for_activity(&self, activity: Activity, timeout: Option<Duration>) -> bool {
        self.wait_key_event(move |state| activity.accepts(state.key), timeout)
            .await
            .is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_matches_either_side() {
        assert!(matches_key(Key::Ctrl, Key::RCtrl));
        assert!(matches_key(Key::A, Key::A));
        assert!(!matches_key(Key::LCtrl, Key::RCtrl));
        assert!(!matches_key(Key::A, Key::B));
    }

    #[test]
    fn test_lock_targets_expand_flags() {
        assert_eq!(lock_targets(&[Key::Ctrl]), vec![Key::LCtrl, Key::RCtrl]);
        assert_eq!(
            lock_targets(&[Key::A, Key::LShift, Key::Shift]),
            vec![Key::A, Key::LShift, Key::RShift]
        );
    }

    #[test]
    fn test_activity_classes() {
        assert!(Activity::Keyboard.accepts(Key::A));
        assert!(!Activity::Keyboard.accepts(Key::LButton));
        assert!(Activity::Mouse.accepts(Key::WheelUp));
        assert!(Activity::Any.accepts(Key::LButton));
    }
}
