//! RAII guard for input locks

use std::fmt;

use tracing::error;

use super::Engine;
use crate::tracker::LockKind;

/// Holds an input lock until dropped
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct InputLock {
    engine: Engine,
    kind: LockKind,
}

impl InputLock {
    pub(crate) fn new(engine: Engine, kind: LockKind) -> Self {
        Self { engine, kind }
    }

    pub fn kind(&self) -> &LockKind {
        &self.kind
    }
}

impl Drop for InputLock {
    fn drop(&mut self) {
        if let Err(e) = self.engine.inner.locks.lock().release(&self.kind) {
            error!(%e, "input lock released twice");
        }
    }
}

impl fmt::Debug for InputLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InputLock").field(&self.kind).finish()
    }
}
