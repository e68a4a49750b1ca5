//! Async coordination primitives
//!
//! - `Gate`: reusable open/closed signal with a payload
//! - `Timer`: cancellable timer with an adjustable deadline
//! - `Job`: single-writer tri-state result
//!
//! Every timeout is a race between the awaited future and a delay that is
//! dropped as soon as the future wins.

mod gate;
mod job;
mod timer;

use std::future::Future;
use std::time::Duration;

pub use gate::Gate;
pub use job::{Job, JobStatus};
pub use timer::Timer;

/// Await `future`, giving up after `timeout`.
///
/// Without a timeout the future always completes the job. Losing the race
/// yields a failed job with a default payload.
pub async fn with_timeout<F>(future: F, timeout: Option<Duration>) -> Job<F::Output>
where
    F: Future,
    F::Output: Clone + Default,
{
    match timeout {
        None => Job::completed(future.await),
        Some(timeout) => match tokio::time::timeout(timeout, future).await {
            Ok(output) => Job::completed(output),
            Err(_) => Job::failed(F::Output::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_success() {
        let job = with_timeout(async { 42 }, Some(Duration::from_millis(10))).await;
        assert!(job.is_success());
        assert_eq!(job.result(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_failure_uses_default() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        };
        let job = with_timeout(slow, Some(Duration::from_millis(10))).await;
        assert_eq!(job.status(), JobStatus::Failure);
        assert_eq!(job.result(), 0);
    }

    #[tokio::test]
    async fn test_without_timeout_always_completes() {
        let job = with_timeout(async { "done" }, None).await;
        assert!(job.is_success());
    }
}
