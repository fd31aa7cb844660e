//! Bounded execution for stages that call into external engines.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How a bounded stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    Finished(T),
    TimedOut,
    /// The worker panicked or could not be started.
    WorkerFailed,
}

/// Run `task` on a helper thread and wait at most `limit` for its result.
///
/// An expired task keeps running detached until it finishes on its own;
/// its result is discarded.
pub fn run_with_deadline<T, F>(stage: &'static str, limit: Duration, task: F) -> StageOutcome<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let spawned = thread::Builder::new()
        .name(format!("intake-{stage}"))
        .spawn(move || {
            // Receiver may already be gone after a timeout.
            let _ = tx.send(task());
        });

    if let Err(e) = spawned {
        tracing::warn!(stage, error = %e, "Could not start stage worker");
        return StageOutcome::WorkerFailed;
    }

    match rx.recv_timeout(limit) {
        Ok(value) => StageOutcome::Finished(value),
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(stage, limit_ms = limit.as_millis() as u64, "Stage timed out");
            StageOutcome::TimedOut
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::warn!(stage, "Stage worker exited without a result");
            StageOutcome::WorkerFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_result_within_limit() {
        let value = run_with_deadline("test", Duration::from_secs(5), || 40 + 2);
        assert_eq!(value, StageOutcome::Finished(42));
    }

    #[test]
    fn times_out_slow_task() {
        let value = run_with_deadline("test", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert_eq!(value, StageOutcome::TimedOut);
    }

    #[test]
    fn panic_is_worker_failure_not_timeout() {
        let value: StageOutcome<u8> =
            run_with_deadline("test", Duration::from_secs(5), || panic!("engine crashed"));
        assert_eq!(value, StageOutcome::WorkerFailed);
    }
}
