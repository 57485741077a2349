//! Background dispatch loop
//!
//! One long-lived task owns the worker pool. It blocks on two inputs at once,
//! submitted locators and reported [`SourceError`]s, and publishes its
//! lifecycle on a watch channel:
//!
//! ```text
//! Running ──(submissions closed)──▶ Draining ──(errors closed, pool joined)──▶ Stopped
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::worker::WorkerPool;
use crate::utils::error::SourceError;

/// Callback invoked for every reported source failure
pub type ErrorHandler = Arc<dyn Fn(&SourceError) + Send + Sync>;

/// Lifecycle of the dispatch loop. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    /// Accepting submissions
    Running,
    /// Submissions closed; waiting for queued jobs and their errors
    Draining,
    /// Pool joined, loop exited
    Stopped,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Handle to a spawned dispatch loop
pub struct DispatchHandle {
    state_rx: watch::Receiver<DispatchState>,
    task: JoinHandle<()>,
}

impl DispatchHandle {
    /// Spawn the loop onto the current runtime
    ///
    /// The loop drains once `submissions` closes and stops once `errors`
    /// closes too, i.e. when every worker and every external reporter has
    /// dropped its sender.
    pub fn spawn(
        pool: Arc<WorkerPool>,
        submissions: mpsc::Receiver<String>,
        errors: mpsc::UnboundedReceiver<SourceError>,
        on_error: ErrorHandler,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(DispatchState::Running);
        let task = tokio::spawn(run(pool, submissions, errors, on_error, state_tx));
        Self { state_rx, task }
    }

    /// Current state
    pub fn state(&self) -> DispatchState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<DispatchState> {
        self.state_rx.clone()
    }

    /// Wait until the loop reports `Stopped`
    pub async fn wait_stopped(&self) {
        let mut rx = self.state_rx.clone();
        // An Err means the sender is gone, which only happens after Stopped.
        let _ = rx.wait_for(|state| *state == DispatchState::Stopped).await;
    }

    /// Wait for the loop task itself to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Dispatch task failed");
        }
    }
}

async fn run(
    pool: Arc<WorkerPool>,
    mut submissions: mpsc::Receiver<String>,
    mut errors: mpsc::UnboundedReceiver<SourceError>,
    on_error: ErrorHandler,
    state_tx: watch::Sender<DispatchState>,
) {
    let mut submissions_open = true;
    let mut errors_open = true;

    tracing::info!(workers = pool.worker_count(), "Dispatch loop started");

    while submissions_open || errors_open {
        tokio::select! {
            locator = submissions.recv(), if submissions_open => match locator {
                Some(locator) => match pool.submit(locator.as_str()).await {
                    Ok(job_id) => tracing::debug!(job_id, locator = %locator, "Submitted"),
                    Err(e) => tracing::error!(locator = %locator, error = %e, "Submit failed"),
                },
                None => {
                    submissions_open = false;
                    state_tx.send_replace(DispatchState::Draining);
                    tracing::info!(pending = pool.pending(), "Submissions closed, draining");
                    pool.stop();
                }
            },
            reported = errors.recv(), if errors_open => match reported {
                Some(err) => {
                    tracing::warn!(locator = %err.locator, error = %err.error, "Source failed");
                    on_error(&err);
                }
                None => errors_open = false,
            },
        }
    }

    pool.join().await;
    state_tx.send_replace(DispatchState::Stopped);
    tracing::info!("Dispatch loop stopped");
}
