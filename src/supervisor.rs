//! Supervised Background Tasks
//!
//! Background work launched from lifecycle hooks is not awaited by the hook
//! that starts it. The supervisor keeps a handle to every such task, catches
//! both returned errors and panics, logs them, and publishes a
//! [`TaskFailure`] on a channel so failures are never silently lost.

use futures_util::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Report for a background task that ended badly
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    /// Unique id of this failure report
    pub id: String,
    /// Name the task was spawned under
    pub task: String,
    /// Error text, or the panic message
    pub error: String,
    /// Whether the task panicked rather than returning an error
    pub panicked: bool,
    /// When the failure was observed
    pub at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default)]
struct SupervisorStats {
    spawned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of supervisor counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatsSnapshot {
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Owner of every fire-and-forget task in the process
pub struct TaskSupervisor {
    failures: mpsc::UnboundedSender<TaskFailure>,
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
    stats: Arc<SupervisorStats>,
}

impl TaskSupervisor {
    /// Create a supervisor and the receiving end of its failure channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            failures: tx,
            handles: Mutex::new(Vec::new()),
            stats: Arc::new(SupervisorStats::default()),
        };
        (supervisor, rx)
    }

    /// Launch `future` in the background under `name`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task = name.to_string();
        let failures = self.failures.clone();
        let stats = self.stats.clone();

        stats.spawned.fetch_add(1, Ordering::Relaxed);
        debug!(task = %task, "spawning supervised task");

        let handle = tokio::spawn({
            let task = task.clone();
            async move {
                let outcome = AssertUnwindSafe(future).catch_unwind().await;
                let failure = match outcome {
                    Ok(Ok(())) => {
                        stats.completed.fetch_add(1, Ordering::Relaxed);
                        debug!(task = %task, "supervised task finished");
                        return;
                    }
                    Ok(Err(e)) => {
                        warn!(task = %task, error = %format!("{:#}", e), "background task failed");
                        TaskFailure::new(&task, format!("{:#}", e), false)
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(task = %task, panic = %message, "background task panicked");
                        TaskFailure::new(&task, message, true)
                    }
                };
                stats.failed.fetch_add(1, Ordering::Relaxed);
                // Nobody listening is fine; the failure is already logged.
                let _ = failures.send(failure);
            }
        });

        let mut handles = self.handles.lock();
        handles.retain(|(_, h)| !h.is_finished());
        handles.push((task, handle));
    }

    /// Names of tasks still running
    pub fn running(&self) -> Vec<String> {
        let mut handles = self.handles.lock();
        handles.retain(|(_, h)| !h.is_finished());
        handles.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn stats(&self) -> SupervisorStatsSnapshot {
        SupervisorStatsSnapshot {
            spawned: self.stats.spawned.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Abort every task still running
    pub fn shutdown(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for (name, handle) in handles {
            if !handle.is_finished() {
                debug!(task = %name, "aborting supervised task");
                handle.abort();
            }
        }
    }
}

impl TaskFailure {
    fn new(task: &str, error: String, panicked: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task: task.to_string(),
            error,
            panicked,
            at: chrono::Utc::now(),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
