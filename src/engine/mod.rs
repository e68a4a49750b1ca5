//! The engine: one explicit value holding all hotkey state
//!
//! Raw input enters through [`Engine::record_input`] (see `funnel`), which
//! updates the key tracker, notifies observers and waiters, resolves the
//! hotkey for the key and spawns its activation. Everything else here is
//! registration and read access to that state.

mod funnel;
mod lock;
mod sender;
mod wait;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ActionFault, Result};
use crate::events::InputEvent;
use crate::hotkey::{Hotkey, HotkeyBuilder, HotkeyHandle, HotkeyProfile, Registry};
use crate::key::Key;
use crate::tracker::{InputLocks, KeyState, KeyTracker, LockKind};

pub use lock::InputLock;
pub use sender::KeySender;
pub use wait::Activity;

use wait::Waiter;

/// Receives faults raised by press actions
pub type FaultHandler = Arc<dyn Fn(&Hotkey, &ActionFault) + Send + Sync>;

const EVENT_CAPACITY: usize = 256;

/// Cheap to clone handle to the shared engine state
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    runtime: Handle,
    /// Serializes `record_input`
    funnel: Mutex<()>,
    tracker: RwLock<KeyTracker>,
    locks: Mutex<InputLocks>,
    registry: Mutex<Registry>,
    /// The hotkey each held key is routed to until it is released
    current: Mutex<HashMap<Key, HotkeyHandle>>,
    waiters: Mutex<Vec<Waiter>>,
    input_tx: broadcast::Sender<InputEvent>,
    fault_handler: RwLock<Option<FaultHandler>>,
    key_sender: RwLock<Option<Arc<dyn KeySender>>>,
    next_id: AtomicU64,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl Engine {
    /// Create an engine bound to the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a runtime; use [`Engine::with_handle`]
    /// there.
    pub fn new(config: Config) -> Self {
        Self::with_handle(config, Handle::current())
    }

    pub fn with_handle(config: Config, runtime: Handle) -> Self {
        let (input_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let tracker = KeyTracker::new(config.history_size);
        Self {
            inner: Arc::new(Inner {
                config,
                runtime,
                funnel: Mutex::new(()),
                tracker: RwLock::new(tracker),
                locks: Mutex::new(InputLocks::default()),
                registry: Mutex::new(Registry::default()),
                current: Mutex::new(HashMap::new()),
                waiters: Mutex::new(Vec::new()),
                input_tx,
                fault_handler: RwLock::new(None),
                key_sender: RwLock::new(None),
                next_id: AtomicU64::new(1),
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // Registration

    /// Validate and register a hotkey
    pub fn create_hotkey(&self, builder: HotkeyBuilder) -> Result<HotkeyHandle> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let hotkey = Arc::new(builder.build(id)?);
        self.inner.registry.lock().add(hotkey.clone());
        info!(id, trigger = %hotkey.trigger(), priority = hotkey.priority(), "hotkey registered");
        Ok(hotkey)
    }

    pub fn remove_hotkey(&self, hotkey: &Hotkey) -> Result<()> {
        self.inner.registry.lock().remove(hotkey)?;
        info!(id = hotkey.id(), trigger = %hotkey.trigger(), "hotkey removed");
        Ok(())
    }

    /// Change a hotkey's priority; it becomes the most recent in its new bucket
    pub fn set_priority(&self, hotkey: &Hotkey, priority: i32) -> Result<()> {
        self.inner.registry.lock().set_priority(hotkey, priority)?;
        Ok(())
    }

    /// The hotkey that would trigger on `key` right now
    pub fn resolve(&self, key: Key) -> Option<HotkeyHandle> {
        let candidates = self.inner.registry.lock().candidates(key);
        candidates
            .into_iter()
            .find(|hotkey| hotkey.is_active(|modifier| self.is_down(modifier)))
    }

    pub fn hotkey_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Create every profile whose debug flag matches `debug`
    pub fn load_profiles(&self, profiles: &[Box<dyn HotkeyProfile>], debug: bool) -> Result<usize> {
        let mut loaded = 0;
        for profile in profiles.iter().filter(|profile| profile.debug() == debug) {
            profile.create(self)?;
            info!(profile = profile.name(), "profile loaded");
            loaded += 1;
        }
        Ok(loaded)
    }

    // Observers and seams

    /// Feed of every real input event, auto-repeats included
    pub fn subscribe(&self) -> broadcast::Receiver<InputEvent> {
        self.inner.input_tx.subscribe()
    }

    pub fn set_fault_handler(&self, handler: impl Fn(&Hotkey, &ActionFault) + Send + Sync + 'static) {
        *self.inner.fault_handler.write() = Some(Arc::new(handler));
    }

    pub fn set_key_sender(&self, sender: Arc<dyn KeySender>) {
        *self.inner.key_sender.write() = Some(sender);
    }

    pub(crate) fn report_fault(&self, hotkey: &Hotkey, fault: ActionFault) {
        let handler = self.inner.fault_handler.read().clone();
        match handler {
            Some(handler) => handler(hotkey, &fault),
            None => error!(id = hotkey.id(), trigger = %hotkey.trigger(), %fault, "hotkey action fault"),
        }
    }

    pub(crate) fn send_key(&self, key: Key, pressed: bool) {
        let sender = self.inner.key_sender.read().clone();
        if let Some(sender) = sender {
            sender.send(key, pressed);
        }
    }

    /// Tap an unassigned key so releasing Win or Alt does not open a menu
    pub(crate) fn suppress_menu(&self) {
        self.send_key(Key::NoMapping, true);
        self.send_key(Key::NoMapping, false);
    }

    // Locks

    /// Block matching input until the returned guard is dropped
    pub fn lock_input(&self, kind: LockKind) -> InputLock {
        self.inner.locks.lock().acquire(&kind);
        InputLock::new(self.clone(), kind)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locks.lock().is_locked()
    }

    // Key state

    pub fn is_down(&self, key: Key) -> bool {
        self.inner.tracker.read().is_down(key)
    }

    pub fn is_down_virtual(&self, key: Key) -> bool {
        self.inner.tracker.read().is_down_virtual(key)
    }

    pub fn state_version(&self, key: Key) -> u64 {
        self.inner.tracker.read().state_version(key)
    }

    pub fn has_changed(&self, key: Key, version: u64) -> bool {
        self.inner.tracker.read().has_changed(key, version)
    }

    pub fn global_id(&self, key: Key) -> u64 {
        self.inner.tracker.read().global_id(key)
    }

    /// Real transitions, newest first
    pub fn history(&self) -> Vec<KeyState> {
        self.inner.tracker.read().history()
    }

    pub fn key_count(&self) -> usize {
        self.inner.tracker.read().key_count()
    }

    pub fn key_count_virtual(&self) -> usize {
        self.inner.tracker.read().key_count_virtual()
    }

    pub fn keyboard_idle(&self) -> Duration {
        self.inner.tracker.read().keyboard_idle()
    }

    pub fn mouse_idle(&self) -> Duration {
        self.inner.tracker.read().mouse_idle()
    }

    pub fn idle(&self) -> Duration {
        self.inner.tracker.read().idle()
    }

    /// Forget the virtual down set, for when the OS view was lost
    pub fn reset_virtual(&self) {
        self.inner.tracker.write().reset_virtual();
    }

    /// Send releases for every virtually held modifier and return them
    pub fn release_modifiers(&self) -> Vec<Key> {
        let held: Vec<Key> = self
            .inner
            .tracker
            .read()
            .down_keys_virtual()
            .into_iter()
            .filter(|key| key.is_modifier())
            .collect();
        for key in &held {
            self.send_key(*key, false);
        }
        held
    }

    /// Press modifiers previously returned by [`Engine::release_modifiers`]
    pub fn restore_modifiers(&self, keys: &[Key]) {
        for key in keys {
            self.send_key(*key, true);
        }
    }

    /// Send releases for every virtually held key
    pub(crate) fn release_virtual_keys(&self) {
        let held = self.inner.tracker.read().down_keys_virtual();
        for key in held {
            self.send_key(key, false);
        }
    }

    // Lifecycle

    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.spawn_on(future, &self.inner.runtime);
    }

    pub(crate) fn activation_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }

    /// Cancel running activations and wait for them to finish
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("engine stopped");
    }
}
