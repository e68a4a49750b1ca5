//! Reusable one-to-many ready signal with a payload

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

use super::Job;

#[derive(Debug, Clone)]
struct GateState<T> {
    open: bool,
    /// Bumped on every open or release so sleeping waiters can tell they
    /// were let through even if the gate has closed again since.
    generation: u64,
    value: T,
}

/// Async gate that suspends waiters while closed.
///
/// `open` lets everyone through until `close` is called. `release` lets the
/// current waiters through without affecting waiters that arrive later.
pub struct Gate<T = ()> {
    state: watch::Sender<GateState<T>>,
}

impl<T: Clone + Default> Gate<T> {
    pub fn new(open: bool) -> Self {
        let (state, _) = watch::channel(GateState {
            open,
            generation: 0,
            value: T::default(),
        });
        Self { state }
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    /// Open the gate; all waits resume immediately
    pub fn open(&self, value: T) {
        self.state.send_modify(|state| {
            if !state.open {
                state.open = true;
                state.generation += 1;
            }
            state.value = value;
        });
    }

    /// Close an open gate. Has no effect while already closed, so waiters
    /// that are currently suspended are never affected.
    pub fn close(&self) {
        self.state.send_if_modified(|state| {
            let was_open = state.open;
            state.open = false;
            was_open
        });
    }

    /// Let all current waiters through without leaving the gate open
    pub fn release(&self, value: T) {
        self.state.send_if_modified(|state| {
            if state.open {
                return false;
            }
            state.generation += 1;
            state.value = value;
            true
        });
    }

    /// Set the value handed to waiters without waking them
    pub fn set_value(&self, value: T) {
        self.state.send_if_modified(|state| {
            state.value = value;
            false
        });
    }

    pub fn value(&self) -> T {
        self.state.borrow().value.clone()
    }

    /// Wait for the gate to open or release
    pub async fn wait(&self) -> T {
        let mut rx = self.state.subscribe();
        let generation = {
            let state = rx.borrow_and_update();
            if state.open {
                return state.value.clone();
            }
            state.generation
        };

        loop {
            if rx.changed().await.is_err() {
                return self.value();
            }
            let state = rx.borrow_and_update();
            if state.open || state.generation != generation {
                return state.value.clone();
            }
        }
    }

    /// Wait for the gate, giving up after `timeout`.
    ///
    /// A timed out wait yields a failed job carrying the current value.
    pub async fn wait_timeout(&self, timeout: Duration) -> Job<T> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(value) => Job::completed(value),
            Err(_) => Job::failed(self.value()),
        }
    }
}

impl<T: Clone + Default> Default for Gate<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

impl<T: fmt::Debug> fmt::Debug for Gate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Gate")
            .field("open", &state.open)
            .field("value", &state.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    #[test]
    fn test_wait_after_open_returns_immediately() {
        let gate = Gate::new(false);
        gate.open(5);
        let mut wait = task::spawn(gate.wait());
        assert_ready_eq!(wait.poll(), 5);
    }

    #[test]
    fn test_wait_before_open_suspends() {
        let gate = Arc::new(Gate::<u8>::new(false));
        let waiter = Arc::clone(&gate);
        let mut wait = task::spawn(async move { waiter.wait().await });

        assert_pending!(wait.poll());
        gate.open(2);
        assert!(wait.is_woken());
        assert_ready_eq!(wait.poll(), 2);
    }

    #[test]
    fn test_release_lets_current_waiters_through_only() {
        let gate = Arc::new(Gate::<u8>::new(false));
        let waiter = Arc::clone(&gate);
        let mut first = task::spawn(async move { waiter.wait().await });
        assert_pending!(first.poll());

        gate.release(7);
        assert!(!gate.is_open());
        assert_ready_eq!(first.poll(), 7);

        let late = Arc::clone(&gate);
        let mut second = task::spawn(async move { late.wait().await });
        assert_pending!(second.poll());
    }

    #[test]
    fn test_close_does_not_clobber_waiters() {
        let gate = Arc::new(Gate::<()>::new(false));
        let waiter = Arc::clone(&gate);
        let mut wait = task::spawn(async move { waiter.wait().await });
        assert_pending!(wait.poll());

        gate.close();
        assert_pending!(wait.poll());

        gate.open(());
        gate.close();
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_release_on_open_gate_keeps_it_open() {
        let gate = Gate::new(true);
        gate.release(1);
        assert!(gate.is_open());
        assert_eq!(gate.value(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_fails_with_current_value() {
        let gate = Gate::new(false);
        gate.set_value(4);
        let job = gate.wait_timeout(Duration::from_millis(50)).await;
        assert!(!job.is_success());
        assert_eq!(job.result(), 4);

        gate.open(8);
        let job = gate.wait_timeout(Duration::from_millis(50)).await;
        assert!(job.is_success());
        assert_eq!(job.result(), 8);
    }
}
