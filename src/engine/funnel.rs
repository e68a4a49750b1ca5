//! The input funnel
//!
//! Every raw event passes through `record_input` one at a time. It decides
//! whether the event is blocked and, for real transitions, dispatches the
//! synchronous half of the hotkey press or release. Action bodies run later
//! in spawned tasks.

use tracing::{debug, trace};

use super::Engine;
use crate::error::{ConsistencyError, Result};
use crate::events::InputEvent;
use crate::hotkey::HotkeyHandle;
use crate::key::Key;
use crate::tracker::KeyState;

impl Engine {
    /// Process one raw input event and return whether to block it
    pub fn record_input(&self, key: Key, pressed: bool, injected: bool, extra_info: usize) -> Result<bool> {
        let _funnel = self.inner.funnel.lock();

        if key == Key::MouseMove {
            if injected {
                return Ok(false);
            }
            let _ = self.inner.input_tx.send(InputEvent::MouseMove);
            self.inner.tracker.write().touch(key);
            return Ok(self.inner.locks.lock().blocks_move());
        }

        if key.is_unknown() {
            return Ok(false);
        }
        let key = if self.config().stateless_numpad {
            key.map_numpad()
        } else {
            key
        };

        if injected && (!key.is_media() || extra_info == self.config().process_id) {
            self.inner.tracker.write().set_virtual(key, pressed);
            return Ok(false);
        }

        let version = {
            let mut tracker = self.inner.tracker.write();
            let changed = tracker.record(key, pressed);
            tracker.touch(key);
            trace!(%key, pressed, changed, "input recorded");
            tracker.state_version(key)
        };

        let _ = self.inner.input_tx.send(InputEvent::Key { key, pressed });
        self.notify_waiters(KeyState::new(key, pressed));

        let locked = self.inner.locks.lock().blocks(key);
        let current = self.inner.current.lock().get(&key).cloned();

        let blocked = match current {
            Some(_) if !pressed => self.key_up(key, version)?,
            _ if locked => {
                debug!(%key, pressed, "input locked");
                return Ok(true);
            }
            Some(hotkey) => hotkey.blocks(),
            None if pressed => self.key_down(key, version)?,
            None => false,
        };

        if !blocked {
            self.inner.tracker.write().set_virtual(key, pressed);
        }
        Ok(blocked)
    }

    fn key_down(&self, key: Key, version: u64) -> Result<bool> {
        let Some(hotkey) = self.resolve(key) else {
            return Ok(false);
        };
        if !key.is_stateless() {
            self.set_current(key, &hotkey)?;
        }

        match hotkey.begin_down(version, self.activation_token())? {
            Some(activation) => {
                debug!(id = hotkey.id(), trigger = %hotkey.trigger(), version, "hotkey pressed");
                self.spawn(hotkey.clone().run(self.clone(), activation));
            }
            None => debug!(id = hotkey.id(), trigger = %hotkey.trigger(), "hotkey press denied"),
        }
        Ok(hotkey.blocks())
    }

    fn key_up(&self, key: Key, version: u64) -> Result<bool> {
        let Some(hotkey) = self.inner.current.lock().remove(&key) else {
            return Ok(false);
        };

        if let Some(activation) = hotkey.begin_up(version, self.activation_token())? {
            debug!(id = hotkey.id(), trigger = %hotkey.trigger(), version, "hotkey released");
            self.spawn(hotkey.clone().run(self.clone(), activation));
        }
        Ok(hotkey.blocks())
    }

    fn set_current(&self, key: Key, hotkey: &HotkeyHandle) -> Result<(), ConsistencyError> {
        let mut current = self.inner.current.lock();
        if let Some(existing) = current.get(&key) {
            return Err(ConsistencyError::AlreadyCurrent {
                key,
                current: existing.priority(),
                new: hotkey.priority(),
            });
        }
        current.insert(key, hotkey.clone());
        Ok(())
    }

    /// Fire every waiter whose predicate accepts `state`.
    ///
    /// Predicates run without the waiter lock held.
    fn notify_waiters(&self, state: KeyState) {
        let pending = std::mem::take(&mut *self.inner.waiters.lock());
        if pending.is_empty() {
            return;
        }

        let mut remaining = Vec::with_capacity(pending.len());
        for waiter in pending {
            if waiter.is_closed() {
                continue;
            }
            if let Some(waiter) = waiter.offer(state) {
                remaining.push(waiter);
            }
        }

        self.inner.waiters.lock().extend(remaining);
    }
}
