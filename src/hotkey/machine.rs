//! Per-hotkey activation state machine
//!
//! Idle → ArmedDown → Idle → ArmedUp → Idle. The synchronous half of each
//! transition (`begin_down`/`begin_up`) runs inside the input funnel; the
//! action body runs afterwards in a spawned, supervised task.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::action::{ActionContext, HAction, Trigger};
use super::trigger::TriggerKey;
use crate::engine::Engine;
use crate::error::{ActionFault, ConfigError, ConsistencyError};
use crate::key::Key;
use crate::sync::{Gate, Job};

/// Extra activation condition evaluated during resolution
pub type Context = Arc<dyn Fn() -> bool + Send + Sync>;

pub type HotkeyHandle = Arc<Hotkey>;

/// Describes a hotkey before the engine registers it
pub struct HotkeyBuilder {
    trigger: TriggerKey,
    down: Option<HAction>,
    up: Option<HAction>,
    context: Option<Context>,
    priority: i32,
    block: bool,
    wild: bool,
    parallel: bool,
}

impl HotkeyBuilder {
    pub fn new(trigger: impl Into<TriggerKey>) -> Self {
        Self {
            trigger: trigger.into(),
            down: None,
            up: None,
            context: None,
            priority: 0,
            block: true,
            wild: true,
            parallel: false,
        }
    }

    pub fn on_down(mut self, action: HAction) -> Self {
        self.down = Some(action);
        self
    }

    pub fn on_up(mut self, action: HAction) -> Self {
        self.up = Some(action);
        self
    }

    pub fn context(mut self, context: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Block the triggering event from reaching other applications
    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Allow extra modifiers beyond the required ones
    pub fn wild(mut self, wild: bool) -> Self {
        self.wild = wild;
        self
    }

    /// Allow new activations while a previous one is still running
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub(crate) fn build(self, id: u64) -> Result<Hotkey, ConfigError> {
        let key = self.trigger.main_key();
        if self.down.is_none() && self.up.is_none() {
            return Err(ConfigError::NoAction);
        }
        if key.is_stateless() {
            if self.up.is_some() {
                return Err(ConfigError::StatelessRelease(key));
            }
            if let Some(down) = &self.down {
                if !matches!(down, HAction::Single(_)) {
                    return Err(ConfigError::StatelessNotSingle(key));
                }
            }
        }
        if let Some(down) = &self.down {
            down.validate(Trigger::Down)?;
        }
        if let Some(up) = &self.up {
            up.validate(Trigger::Up)?;
        }

        let sub_priority = self.trigger.modifiers().len().min(4) as u8
            + if self.context.is_some() { 5 } else { 0 };

        Ok(Hotkey {
            id,
            negative_modifiers: self.trigger.negative_modifiers(),
            trigger: self.trigger,
            down_action: self.down.map(Arc::new),
            up_action: self.up.map(Arc::new),
            context: self.context,
            priority: AtomicI32::new(self.priority),
            sub_priority,
            enabled: AtomicBool::new(true),
            block: AtomicBool::new(self.block),
            wild: AtomicBool::new(self.wild),
            parallel: AtomicBool::new(self.parallel),
            running: AtomicU32::new(0),
            state: Mutex::new(ActivationState::default()),
            stopped: Gate::new(true),
        })
    }
}

#[derive(Default)]
struct ActivationState {
    is_down: bool,
    /// The last press was denied; its release is swallowed too
    denied: bool,
    /// Completion of the latest down activation, awaited by a serial release
    pending_down: Option<Job<()>>,
    /// Cancellation of the in-flight up action
    up_cancel: Option<CancellationToken>,
}

/// One accepted transition, ready to run outside the funnel
pub(crate) struct Activation {
    trigger: Trigger,
    action: Option<Arc<HAction>>,
    version: u64,
    cancel: CancellationToken,
    prior: Option<Job<()>>,
    done: Option<Job<()>>,
}

pub struct Hotkey {
    id: u64,
    trigger: TriggerKey,
    negative_modifiers: Vec<Key>,
    down_action: Option<Arc<HAction>>,
    up_action: Option<Arc<HAction>>,
    context: Option<Context>,
    priority: AtomicI32,
    sub_priority: u8,
    enabled: AtomicBool,
    block: AtomicBool,
    wild: AtomicBool,
    parallel: AtomicBool,
    running: AtomicU32,
    state: Mutex<ActivationState>,
    stopped: Gate<()>,
}

impl Hotkey {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn trigger(&self) -> &TriggerKey {
        &self.trigger
    }

    pub fn main_key(&self) -> Key {
        self.trigger.main_key()
    }

    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::SeqCst)
    }

    /// Only the registry may change this, since it decides the bucket
    pub(crate) fn store_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::SeqCst);
    }

    /// Derived tiebreak weight: modifier count (capped at 4), plus 5 with a context
    pub fn sub_priority(&self) -> u8 {
        self.sub_priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn blocks(&self) -> bool {
        self.block.load(Ordering::SeqCst)
    }

    pub fn set_block(&self, block: bool) {
        self.block.store(block, Ordering::SeqCst);
    }

    pub fn is_wild(&self) -> bool {
        self.wild.load(Ordering::SeqCst)
    }

    pub fn set_wild(&self, wild: bool) {
        self.wild.store(wild, Ordering::SeqCst);
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel.load(Ordering::SeqCst)
    }

    pub fn set_parallel(&self, parallel: bool) {
        self.parallel.store(parallel, Ordering::SeqCst);
    }

    pub fn is_down(&self) -> bool {
        self.state.lock().is_down
    }

    pub fn running_count(&self) -> u32 {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether this hotkey may trigger given the current key states.
    ///
    /// The context predicate is user code, so it is only consulted once the
    /// cheap modifier checks pass.
    pub fn is_active(&self, is_down: impl Fn(Key) -> bool) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if !self.trigger.modifiers().iter().all(|key| is_down(*key)) {
            return false;
        }
        if !self.is_wild() && self.negative_modifiers.iter().any(|key| is_down(*key)) {
            return false;
        }
        self.context.as_ref().map_or(true, |context| context())
    }

    /// Accept or deny a press
    pub(crate) fn begin_down(
        &self,
        version: u64,
        cancel: CancellationToken,
    ) -> Result<Option<Activation>, ConsistencyError> {
        let mut state = self.state.lock();

        state.denied = !self.is_parallel() && self.running_count() > 0;
        if state.denied {
            debug!(id = self.id, trigger = %self.trigger, "press denied, activation still running");
            return Ok(None);
        }
        if state.is_down {
            return Err(ConsistencyError::ReentrantKeyDown {
                id: self.id,
                key: self.main_key(),
            });
        }

        if !self.main_key().is_stateless() {
            state.is_down = true;
        }
        self.running_started();

        let done = Job::pending();
        state.pending_down = Some(done.clone());

        Ok(Some(Activation {
            trigger: Trigger::Down,
            action: self.down_action.clone(),
            version,
            cancel,
            prior: None,
            done: Some(done),
        }))
    }

    /// Accept a release, swallowing the one paired with a denied press
    pub(crate) fn begin_up(
        &self,
        version: u64,
        cancel: CancellationToken,
    ) -> Result<Option<Activation>, ConsistencyError> {
        let mut state = self.state.lock();

        if std::mem::take(&mut state.denied) {
            return Ok(None);
        }
        if self.main_key().is_stateless() {
            return Err(ConsistencyError::StatelessRelease {
                id: self.id,
                key: self.main_key(),
            });
        }
        if !state.is_down {
            return Err(ConsistencyError::ReentrantKeyUp {
                id: self.id,
                key: self.main_key(),
            });
        }

        state.is_down = false;
        self.running_started();

        let prior = if self.is_parallel() {
            None
        } else {
            state.pending_down.take()
        };
        if let Some(previous) = state.up_cancel.replace(cancel.clone()) {
            previous.cancel();
        }

        Ok(Some(Activation {
            trigger: Trigger::Up,
            action: self.up_action.clone(),
            version,
            cancel,
            prior,
            done: None,
        }))
    }

    /// Run an accepted activation to completion
    pub(crate) async fn run(self: Arc<Self>, engine: Engine, activation: Activation) {
        if let Some(prior) = &activation.prior {
            prior.wait_for_finish().await;
        }

        if let Some(action) = activation.action {
            if activation.trigger == Trigger::Down && self.needs_menu_suppression() {
                engine.suppress_menu();
            }

            let ctx = ActionContext::new(
                engine.clone(),
                self.id,
                self.main_key(),
                activation.trigger,
                activation.version,
                activation.cancel,
            );
            if let Err(fault) = supervise(action, ctx).await {
                match activation.trigger {
                    Trigger::Down => engine.report_fault(&self, fault),
                    Trigger::Up => {
                        error!(id = self.id, trigger = %self.trigger, %fault, "release action fault")
                    }
                }
            }
        }

        self.running_stopped();
        if let Some(done) = activation.done {
            let _ = done.complete(());
        }
    }

    fn needs_menu_suppression(&self) -> bool {
        self.trigger
            .modifiers()
            .iter()
            .any(|key| key.is_win() || key.is_alt())
    }

    fn running_started(&self) {
        if self.running.fetch_add(1, Ordering::SeqCst) == 0 {
            self.stopped.close();
        }
    }

    fn running_stopped(&self) {
        if self.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.stopped.open(());
        }
    }

    /// Wait until no activation of this hotkey is running
    pub async fn wait_for_stop(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => self.stopped.wait_timeout(timeout).await.is_success(),
            None => {
                self.stopped.wait().await;
                true
            }
        }
    }
}

impl fmt::Debug for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hotkey")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("down", &self.down_action)
            .field("up", &self.up_action)
            .field("priority", &self.priority())
            .field("running", &self.running_count())
            .finish()
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.trigger)
    }
}

/// Run the action in its own task so a panic becomes a fault instead of
/// tearing down the activation
async fn supervise(action: Arc<HAction>, ctx: ActionContext) -> Result<(), ActionFault> {
    let handle = tokio::spawn(async move { action.run(ctx).await });
    match handle.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ActionFault::Failed(e)),
        Err(e) if e.is_panic() => Err(ActionFault::Panicked(panic_message(e.into_panic()))),
        Err(_) => Err(ActionFault::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
