//! Cancelable one-shot timer built on tokio tasks.
//!
//! Timer handles are easy to leak when stored as raw task handles:
//! replacing a timer without aborting the old task leaves two fires in
//! flight. `CancelableTimer` makes cancel-and-replace a single move and
//! aborts the underlying task on drop.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A one-shot timer that runs a future after a delay unless canceled.
///
/// Dropping the timer cancels it. Replacing a stored timer with a new one
/// therefore cancels the old fire before the new one is armed.
#[derive(Debug)]
pub struct CancelableTimer {
    handle: JoinHandle<()>,
}

impl CancelableTimer {
    /// Arm a timer that awaits `task` after `delay`.
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { handle }
    }

    /// Cancel the timer. Safe to call after the timer has fired.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the timer task has completed (fired or been aborted).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CancelableTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
