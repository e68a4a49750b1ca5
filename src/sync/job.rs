//! Tri-state async result holder

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone)]
struct JobState<T> {
    status: JobStatus,
    result: T,
}

/// A single-writer result that is pending until completed or failed.
///
/// Clones share the same underlying state, so one side can finish the job
/// while any number of others wait on it.
pub struct Job<T> {
    state: Arc<watch::Sender<JobState<T>>>,
}

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Clone + Default> Job<T> {
    /// Create an unfinished job with a default result
    pub fn pending() -> Self {
        Self::with_status(JobStatus::Pending, T::default())
    }

    /// Create a successful job
    pub fn completed(result: T) -> Self {
        Self::with_status(JobStatus::Success, result)
    }

    /// Create a failed job carrying `result`
    pub fn failed(result: T) -> Self {
        Self::with_status(JobStatus::Failure, result)
    }

    fn with_status(status: JobStatus, result: T) -> Self {
        let (state, _) = watch::channel(JobState { status, result });
        Self {
            state: Arc::new(state),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.borrow().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == JobStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status() == JobStatus::Success
    }

    pub fn result(&self) -> T {
        self.state.borrow().result.clone()
    }

    /// Finish the job successfully
    pub fn complete(&self, result: T) -> Result<(), JobError> {
        self.finish(JobStatus::Success, result)
    }

    /// Finish the job as failed
    pub fn fail(&self, result: T) -> Result<(), JobError> {
        self.finish(JobStatus::Failure, result)
    }

    fn finish(&self, status: JobStatus, result: T) -> Result<(), JobError> {
        let mut previous = JobStatus::Pending;
        let changed = self.state.send_if_modified(|state| {
            if state.status != JobStatus::Pending {
                previous = state.status;
                return false;
            }
            state.status = status;
            state.result = result;
            true
        });

        if changed {
            Ok(())
        } else {
            Err(JobError::AlreadyFinished(previous))
        }
    }

    /// Wait until the job is finished; returns whether it succeeded
    pub async fn wait_for_finish(&self) -> bool {
        let mut rx = self.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.status != JobStatus::Pending {
                    return state.status == JobStatus::Success;
                }
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Job")
            .field("status", &state.status)
            .field("result", &state.result)
            .finish()
    }
}
