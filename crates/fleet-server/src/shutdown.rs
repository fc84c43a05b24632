//! Shutdown coordination.
//!
//! Long-lived tasks are tracked on a roster at spawn time. Shutdown cancels
//! the shared token, which every connection loop and the accept loop observe,
//! then joins the roster under a deadline so the process exits with its work
//! drained rather than torn down mid-write.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancellation fan-out plus the roster of tasks to drain on exit.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracked: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracked: Mutex::new(Vec::new()),
        }
    }

    /// Token observed by the accept loop and the connection loops.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Put `handle` on the roster; [`graceful_shutdown`] waits for it.
    ///
    /// [`graceful_shutdown`]: Self::graceful_shutdown
    pub fn track(&self, handle: JoinHandle<()>) {
        self.tracked.lock().push(handle);
    }

    /// Signal shutdown without waiting for the roster.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` for tracked tasks to
    /// finish. Tasks still running at the deadline are abandoned.
    pub async fn graceful_shutdown(&self, timeout: Duration) {
        self.shutdown();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tracked.lock());
        info!(task_count = tasks.len(), "draining tasks before exit");

        let drain = futures::future::join_all(tasks);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "tasks still running at shutdown deadline"
            );
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
    }

    #[test]
    fn shutdown_sets_flag_and_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        coord.shutdown();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_drains_tracked_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        coord.track(tokio::spawn(async move {
            token.cancelled().await;
            let _ = done_tx.send(());
        }));

        coord.graceful_shutdown(Duration::from_secs(5)).await;
        assert!(coord.is_shutting_down());
        // The tracked task ran to completion before the drain returned.
        done_rx.await.unwrap();
    }

    #[tokio::test]
    async fn graceful_shutdown_times_out_on_stuck_task() {
        let coord = ShutdownCoordinator::new();
        coord.track(tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        }));

        coord.graceful_shutdown(Duration::from_millis(50)).await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn empty_roster_drains_immediately() {
        let coord = ShutdownCoordinator::new();
        coord.graceful_shutdown(Duration::from_secs(5)).await;
        assert!(coord.is_shutting_down());
    }
}
