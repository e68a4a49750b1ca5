//! Action kinds describing how a callback plays out over a key press
//!
//! - `Single`: invoke once
//! - `Rapid`: invoke in a paced loop until the key changes state or a
//!   maximum count is reached
//! - `Repeat`: invoke, then behave like OS auto-repeat while held
//! - `Hold`: tap callback if released within a window, hold callback otherwise
//! - `Double`: double callback if pressed again within a window, single otherwise

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::error::ConfigError;
use crate::key::Key;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Which side of a key press an action is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Down,
    Up,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Down => write!(f, "press"),
            Trigger::Up => write!(f, "release"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Single,
    Rapid,
    Repeat,
    Hold,
    Double,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Single => write!(f, "single"),
            ActionKind::Rapid => write!(f, "rapid"),
            ActionKind::Repeat => write!(f, "repeat"),
            ActionKind::Hold => write!(f, "hold"),
            ActionKind::Double => write!(f, "double"),
        }
    }
}

/// A user callback invoked by an action
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(ActionContext) -> BoxFuture<anyhow::Result<()>> + Send + Sync>);

impl Callback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self(Arc::new(move |ctx| Box::pin(f(ctx))))
    }

    /// Wrap a callback that completes without suspending
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&ActionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx| {
            let result = f(&ctx);
            Box::pin(std::future::ready(result))
        }))
    }

    fn call(&self, ctx: ActionContext) -> BoxFuture<anyhow::Result<()>> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// Per-activation view handed to callbacks.
///
/// Stamped with the main key's state version at dispatch, so a callback can
/// tell whether the key has changed state since it was triggered.
#[derive(Clone)]
pub struct ActionContext {
    engine: Engine,
    hotkey_id: u64,
    key: Key,
    trigger: Trigger,
    version: u64,
    iteration: u32,
    cancel: CancellationToken,
}

impl ActionContext {
    pub(crate) fn new(
        engine: Engine,
        hotkey_id: u64,
        key: Key,
        trigger: Trigger,
        version: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            hotkey_id,
            key,
            trigger,
            version,
            iteration: 0,
            cancel,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn hotkey_id(&self) -> u64 {
        self.hotkey_id
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// State version of the main key when the action was dispatched
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Zero-based invocation index within a looping action
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// The main key changed state since dispatch
    pub fn is_stale(&self) -> bool {
        self.engine.has_changed(self.key, self.version)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.is_stale()
    }

    fn with_iteration(&self, iteration: u32) -> Self {
        Self {
            iteration,
            ..self.clone()
        }
    }
}

pub enum HAction {
    Single(Callback),
    Rapid {
        delay: Option<Duration>,
        max_count: Option<u32>,
        callback: Callback,
    },
    Repeat(Callback),
    Hold {
        window: Duration,
        tap: Callback,
        hold: Callback,
    },
    Double {
        window: Duration,
        single: Callback,
        double: Callback,
    },
}

impl HAction {
    pub fn single(callback: Callback) -> Self {
        HAction::Single(callback)
    }

    pub fn rapid(delay: Option<Duration>, max_count: Option<u32>, callback: Callback) -> Self {
        HAction::Rapid {
            delay,
            max_count,
            callback,
        }
    }

    pub fn repeat(callback: Callback) -> Self {
        HAction::Repeat(callback)
    }

    pub fn hold(window: Duration, tap: Callback, hold: Callback) -> Self {
        HAction::Hold { window, tap, hold }
    }

    pub fn double(window: Duration, single: Callback, double: Callback) -> Self {
        HAction::Double {
            window,
            single,
            double,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            HAction::Single(_) => ActionKind::Single,
            HAction::Rapid { .. } => ActionKind::Rapid,
            HAction::Repeat(_) => ActionKind::Repeat,
            HAction::Hold { .. } => ActionKind::Hold,
            HAction::Double { .. } => ActionKind::Double,
        }
    }

    /// Check that this kind may be bound to `trigger`
    pub fn validate(&self, trigger: Trigger) -> Result<(), ConfigError> {
        let down_only = matches!(
            self.kind(),
            ActionKind::Rapid | ActionKind::Repeat | ActionKind::Hold
        );
        if down_only && trigger == Trigger::Up {
            return Err(ConfigError::IllegalTrigger {
                kind: self.kind(),
                trigger,
            });
        }
        Ok(())
    }

    pub async fn run(&self, ctx: ActionContext) -> anyhow::Result<()> {
        match self {
            HAction::Single(callback) => callback.call(ctx).await,

            HAction::Rapid {
                delay,
                max_count,
                callback,
            } => {
                let mut count = 0;
                while !ctx.should_stop() && max_count.map_or(true, |max| count < max) {
                    let call = callback.call(ctx.with_iteration(count));
                    match delay {
                        Some(delay) => {
                            let (result, _) = tokio::join!(call, tokio::time::sleep(*delay));
                            result?;
                        }
                        None => {
                            call.await?;
                            tokio::task::yield_now().await;
                        }
                    }
                    count += 1;
                }
                Ok(())
            }

            HAction::Repeat(callback) => {
                let engine = ctx.engine().clone();
                let repeat_delay = engine.config().key_repeat_delay;
                let interval = engine.config().key_repeat_interval;

                let first = callback.call(ctx.with_iteration(0));
                let released = engine.wait_key_up(ctx.key(), Some(repeat_delay), false);
                let (result, released) = tokio::join!(first, released);
                result?;
                if released {
                    return Ok(());
                }

                let mut iteration = 1;
                while !ctx.should_stop() {
                    let call = callback.call(ctx.with_iteration(iteration));
                    let (result, _) = tokio::join!(call, tokio::time::sleep(interval));
                    result?;
                    iteration += 1;
                }
                Ok(())
            }

            HAction::Hold { window, tap, hold } => {
                let released = ctx
                    .engine()
                    .wait_key_up(ctx.key(), Some(*window), false)
                    .await;
                if released {
                    tap.call(ctx).await
                } else {
                    hold.call(ctx).await
                }
            }

            HAction::Double {
                window,
                single,
                double,
            } => {
                let again = ctx.engine().wait_key(ctx.key(), Some(*window), false).await;
                if again {
                    double.call(ctx).await
                } else {
                    single.call(ctx).await
                }
            }
        }
    }
}

impl fmt::Debug for HAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HAction::Single(_) | HAction::Repeat(_) => write!(f, "{}", self.kind()),
            HAction::Rapid {
                delay, max_count, ..
            } => write!(f, "rapid(delay: {delay:?}, max_count: {max_count:?})"),
            HAction::Hold { window, .. } | HAction::Double { window, .. } => {
                write!(f, "{}({window:?})", self.kind())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback {
        Callback::sync(|_| Ok(()))
    }

    #[test]
    fn test_down_only_kinds_reject_release() {
        let ms = Duration::from_millis(100);
        let actions = [
            HAction::rapid(None, None, noop()),
            HAction::repeat(noop()),
            HAction::hold(ms, noop(), noop()),
        ];
        for action in &actions {
            assert!(action.validate(Trigger::Down).is_ok());
            assert_eq!(
                action.validate(Trigger::Up),
                Err(ConfigError::IllegalTrigger {
                    kind: action.kind(),
                    trigger: Trigger::Up
                })
            );
        }
    }

    #[test]
    fn test_single_and_double_bind_either_side() {
        let double = HAction::double(Duration::from_millis(200), noop(), noop());
        assert!(double.validate(Trigger::Up).is_ok());
        assert!(HAction::single(noop()).validate(Trigger::Up).is_ok());
    }

    #[test]
    fn test_debug_shows_parameters() {
        let action = HAction::rapid(Some(Duration::from_millis(50)), Some(3), noop());
        assert_eq!(
            format!("{action:?}"),
            "rapid(delay: Some(50ms), max_count: Some(3))"
        );
        assert_eq!(format!("{:?}", HAction::repeat(noop())), "repeat");
    }
}
