//! One-shot start guard
//!
//! Tracks whether a process-wide task has been started, with an atomic
//! claim so concurrent callers (e.g. back-to-back reconnect events) can
//! never both start it.

use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

/// Start states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StartState {
    /// Nobody has claimed the start yet
    NotStarted = 0,
    /// A caller holds the claim and is launching the task
    Starting = 1,
    /// The task has been launched; terminal
    Started = 2,
}

impl From<u8> for StartState {
    fn from(v: u8) -> Self {
        match v {
            0 => StartState::NotStarted,
            1 => StartState::Starting,
            _ => StartState::Started,
        }
    }
}

/// Guard allowing a task to be started at most once
#[derive(Debug)]
pub struct StartGuard {
    name: &'static str,
    state: AtomicU8,
}

impl StartGuard {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(StartState::NotStarted as u8),
        }
    }

    pub fn state(&self) -> StartState {
        StartState::from(self.state.load(Ordering::Acquire))
    }

    pub fn is_started(&self) -> bool {
        self.state() == StartState::Started
    }

    /// Claim the right to start. Returns `None` if another caller already
    /// holds or has used the claim.
    pub fn try_claim(&self) -> Option<StartClaim<'_>> {
        self.state
            .compare_exchange(
                StartState::NotStarted as u8,
                StartState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| StartClaim {
                guard: self,
                committed: false,
            })
    }
}

/// Exclusive claim on a [`StartGuard`].
///
/// Call [`StartClaim::commit`] once the task is launched. Dropping the claim
/// uncommitted releases it back to `NotStarted`.
#[must_use = "dropping a claim without commit() releases it"]
pub struct StartClaim<'a> {
    guard: &'a StartGuard,
    committed: bool,
}

impl StartClaim<'_> {
    pub fn commit(mut self) {
        self.guard
            .state
            .store(StartState::Started as u8, Ordering::Release);
        self.committed = true;
        debug!(guard = self.guard.name, "start committed");
    }
}

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.guard
                .state
                .store(StartState::NotStarted as u8, Ordering::Release);
            debug!(guard = self.guard.name, "start claim released");
        }
    }
}
