//! Interval Job Scheduler
//!
//! Named, interval-triggered recurring jobs:
//! - One background loop per job id
//! - Re-registering an id replaces the previous job
//! - A failing or panicking run is logged and counted; later runs still happen
//! - Manual triggering via [`JobScheduler::run_now`]

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{OrchestratorError, Result};
use crate::supervisor::panic_message;

/// Floor applied to job intervals; tokio intervals cannot be zero
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Ceiling applied to job intervals so deadlines never overflow `Instant`
const MAX_INTERVAL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Result of a single job run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    Panicked(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// Per-job run counters
#[derive(Debug, Default)]
struct JobStats {
    runs: AtomicU64,
    failures: AtomicU64,
    last_duration_ms: AtomicU64,
}

/// Snapshot of a job's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobStatsSnapshot {
    pub runs: u64,
    pub failures: u64,
    pub last_duration: Duration,
}

struct JobEntry {
    every: Duration,
    callback: JobCallback,
    stats: Arc<JobStats>,
    handle: JoinHandle<()>,
}

/// Registry and driver for recurring interval jobs
pub struct JobScheduler {
    jobs: RwLock<HashMap<String, JobEntry>>,
    shutdown_tx: watch::Sender<bool>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            jobs: RwLock::new(HashMap::new()),
            shutdown_tx,
        }
    }

    /// Register `job` to run every `every`, first run one interval from now.
    ///
    /// An existing job with the same id is stopped and replaced. Returns
    /// false, without scheduling anything, once the scheduler is shut down.
    /// Must be called from within a tokio runtime.
    pub fn add_interval_job<F, Fut>(&self, id: &str, every: Duration, job: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.is_shut_down() {
            warn!(job = id, "Scheduler stopped, job not registered");
            return false;
        }

        let every = every.clamp(MIN_INTERVAL, MAX_INTERVAL);
        let callback: JobCallback = Arc::new(move || job().boxed());
        let stats = Arc::new(JobStats::default());

        let handle = tokio::spawn(run_loop(
            id.to_string(),
            every,
            callback.clone(),
            stats.clone(),
            self.shutdown_tx.subscribe(),
        ));

        let entry = JobEntry {
            every,
            callback,
            stats,
            handle,
        };

        if let Some(previous) = self.jobs.write().insert(id.to_string(), entry) {
            previous.handle.abort();
            info!(job = id, every_secs = every.as_secs_f64(), "Replaced scheduled job");
        } else {
            info!(job = id, every_secs = every.as_secs_f64(), "Scheduled job");
        }
        true
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop and remove a job. Returns false if no such job exists.
    pub fn remove_job(&self, id: &str) -> bool {
        match self.jobs.write().remove(id) {
            Some(entry) => {
                entry.handle.abort();
                info!(job = id, "Removed scheduled job");
                true
            }
            None => false,
        }
    }

    /// Run a job once, immediately, outside its interval
    pub async fn run_now(&self, id: &str) -> Result<JobOutcome> {
        let (callback, stats) = {
            let jobs = self.jobs.read();
            let entry = jobs
                .get(id)
                .ok_or_else(|| OrchestratorError::JobNotFound(id.to_string()))?;
            (entry.callback.clone(), entry.stats.clone())
        };
        Ok(run_once(id, &callback, &stats).await)
    }

    /// Registered job ids, sorted
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn job_interval(&self, id: &str) -> Option<Duration> {
        self.jobs.read().get(id).map(|entry| entry.every)
    }

    pub fn job_stats(&self, id: &str) -> Option<JobStatsSnapshot> {
        self.jobs.read().get(id).map(|entry| JobStatsSnapshot {
            runs: entry.stats.runs.load(Ordering::Relaxed),
            failures: entry.stats.failures.load(Ordering::Relaxed),
            last_duration: Duration::from_millis(entry.stats.last_duration_ms.load(Ordering::Relaxed)),
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Stop every job loop and clear the registry
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let drained: Vec<(String, JobEntry)> = self.jobs.write().drain().collect();
        for (id, entry) in drained {
            entry.handle.abort();
            debug!(job = %id, "Stopped scheduled job");
        }
        info!("Job scheduler stopped");
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        for entry in self.jobs.get_mut().values() {
            entry.handle.abort();
        }
    }
}

async fn run_loop(
    id: String,
    every: Duration,
    callback: JobCallback,
    stats: Arc<JobStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    if *shutdown.borrow_and_update() {
        return;
    }

    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_once(&id, &callback, &stats).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!(job = %id, "Job loop shutting down");
                    break;
                }
            }
        }
    }
}

async fn run_once(id: &str, callback: &JobCallback, stats: &JobStats) -> JobOutcome {
    let started = std::time::Instant::now();
    let outcome = match AssertUnwindSafe(callback()).catch_unwind().await {
        Ok(Ok(())) => JobOutcome::Succeeded,
        Ok(Err(e)) => {
            let message = format!("{:#}", e);
            warn!(job = id, error = %message, "Job run failed");
            JobOutcome::Failed(message)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(job = id, panic = %message, "Job run panicked");
            JobOutcome::Panicked(message)
        }
    };

    stats.runs.fetch_add(1, Ordering::Relaxed);
    if !outcome.is_success() {
        stats.failures.fetch_add(1, Ordering::Relaxed);
    }
    stats
        .last_duration_ms
        .store(started.elapsed().as_millis() as u64, Ordering::Relaxed);

    outcome
}
