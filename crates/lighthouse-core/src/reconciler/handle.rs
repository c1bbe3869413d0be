//! Handle to a running poll loop

use super::Reconciler;
use crate::error::{Error, Result};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Controls a poll loop spawned by [`Reconciler::start`]
///
/// Dropping the handle also stops the loop.
pub struct ReconcilerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Reconciler>,
}

impl ReconcilerHandle {
    pub(super) fn new(shutdown_tx: oneshot::Sender<()>, task: JoinHandle<Reconciler>) -> Self {
        Self {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }

    /// Whether the loop has not been asked to stop and is still alive
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && !self.task.is_finished()
    }

    /// Cancel the timer
    ///
    /// No further cycles start. A cycle already running finishes. Calling
    /// this again, or after the loop has exited, does nothing.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            info!("Stopping updater");
            // the loop may already be gone
            let _ = tx.send(());
        }
    }

    /// Stop and wait for the loop to exit, returning the reconciler
    ///
    /// Waits for any in-flight cycle; callers that cannot wait indefinitely
    /// should wrap this in `tokio::time::timeout`.
    pub async fn shutdown(mut self) -> Result<Reconciler> {
        self.stop();
        self.task
            .await
            .map_err(|e| Error::Other(format!("Reconciler task failed: {}", e)))
    }
}
