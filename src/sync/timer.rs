//! Cancellable timer with an adjustable deadline

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Gate;
use crate::error::TimerError;

struct TimerState {
    running: bool,
    /// Set once the callback has run for the current start
    fired: bool,
    duration: Duration,
    started: Instant,
    cancel: CancellationToken,
}

struct TimerInner {
    state: Mutex<TimerState>,
    /// Wakes the running timer after its deadline moved
    rearm: Notify,
    /// Open while the timer is idle; the value tells whether it fired
    done: Gate<bool>,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl TimerInner {
    fn remaining(&self) -> Duration {
        let state = self.state.lock();
        (state.started + state.duration).saturating_duration_since(Instant::now())
    }
}

/// Fires a callback once its duration elapses unless stopped first.
///
/// Must be started from within a Tokio runtime.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState {
                    running: false,
                    fired: false,
                    duration: Duration::ZERO,
                    started: Instant::now(),
                    cancel: CancellationToken::new(),
                }),
                rearm: Notify::new(),
                done: Gate::new(true),
                callback: Box::new(callback),
            }),
        }
    }

    pub fn start(&self, duration: Duration) -> Result<&Self, TimerError> {
        let cancel = {
            let mut state = self.inner.state.lock();
            if state.running {
                return Err(TimerError::AlreadyRunning);
            }
            state.running = true;
            state.fired = false;
            state.duration = duration;
            state.started = Instant::now();
            state.cancel = CancellationToken::new();
            state.cancel.clone()
        };

        self.inner.done.close();
        tokio::spawn(run(Arc::clone(&self.inner), cancel));
        Ok(self)
    }

    /// Move the deadline to `duration` from now.
    ///
    /// Overwrites the previous total to 'elapsed + duration'.
    pub fn adjust(&self, duration: Duration) -> &Self {
        {
            let mut state = self.inner.state.lock();
            state.duration = state.started.elapsed() + duration;
        }
        self.inner.rearm.notify_one();
        self
    }

    /// Add `delta` to the total duration
    pub fn extend(&self, delta: Duration) -> &Self {
        self.inner.state.lock().duration += delta;
        self.inner.rearm.notify_one();
        self
    }

    /// Cancel without firing the callback
    pub fn stop(&self) -> &Self {
        self.halt(false);
        self
    }

    /// Cancel and fire the callback immediately, unless it already fired
    pub fn finish(&self) -> &Self {
        if self.halt(true) {
            (self.inner.callback)();
        }
        self
    }

    /// Stop and start again with `duration`, or the previous duration
    pub fn reset(&self, duration: Option<Duration>) -> Result<&Self, TimerError> {
        self.stop();
        let duration = duration.unwrap_or_else(|| self.duration());
        self.start(duration)
    }

    /// Returns true if the caller should run the callback
    fn halt(&self, fire: bool) -> bool {
        let (was_running, fire) = {
            let mut state = self.inner.state.lock();
            state.cancel.cancel();
            let was_running = std::mem::replace(&mut state.running, false);
            let fire = fire && !state.fired;
            state.fired |= fire;
            (was_running, fire)
        };
        if was_running {
            self.inner.done.open(fire);
        }
        fire
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn duration(&self) -> Duration {
        self.inner.state.lock().duration
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.state.lock().started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.inner.remaining()
    }

    /// Fraction of the duration that has passed, clamped to `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        let state = self.inner.state.lock();
        if state.duration.is_zero() {
            return 1.0;
        }
        (state.started.elapsed().as_secs_f64() / state.duration.as_secs_f64()).min(1.0)
    }

    /// Wait until the timer is idle.
    ///
    /// Returns true if it fired or was finished, false if it was stopped or
    /// `timeout` passed first.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => {
                let job = self.inner.done.wait_timeout(timeout).await;
                job.is_success() && job.result()
            }
            None => self.inner.done.wait().await,
        }
    }
}

async fn run(inner: Arc<TimerInner>, cancel: CancellationToken) {
    loop {
        let remaining = inner.remaining();
        if remaining.is_zero() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("timer cancelled");
                return;
            }
            _ = tokio::time::sleep(remaining) => {}
            _ = inner.rearm.notified() => {}
        }
    }

    {
        let mut state = inner.state.lock();
        if cancel.is_cancelled() {
            return;
        }
        state.running = false;
        state.fired = true;
    }

    inner.done.open(true);
    (inner.callback)();
}
