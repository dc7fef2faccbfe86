//! Core types shared by the chain registry, policy and driver.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::agent::SolverError;

/// Opaque identifier of a quiz task (its page URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Why a chain ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminateReason {
    /// The server returned no next task.
    ChainComplete,
    /// Submissions kept failing to reach the server.
    DeliveryFailed,
}

impl fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminateReason::ChainComplete => write!(f, "chain complete"),
            TerminateReason::DeliveryFailed => write!(f, "submission could not be delivered"),
        }
    }
}

/// What to do after one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep working the current task.
    RetrySame,
    /// Switch to the given task.
    AdvanceTo(TaskId),
    /// Stop the chain.
    Terminate(TerminateReason),
}

/// Mutable state of one chain run.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub current_task: TaskId,
    /// Absolute watchdog deadline, fixed at run start.
    pub deadline: Instant,
}

impl ChainState {
    pub fn new(seed: TaskId, deadline: Instant) -> Self {
        Self {
            current_task: seed,
            deadline,
        }
    }
}

/// Unrecoverable, chain-wide failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("Iteration limit reached: {0}")]
    IterationLimit(usize),

    #[error("Submission to {endpoint} failed: {message}")]
    Delivery { endpoint: String, message: String },
}

/// Terminal state of a chain run.
#[derive(Debug, Clone)]
pub enum ChainStatus {
    Completed,
    Timeout,
    Failed(ChainError),
}

impl ChainStatus {
    /// Short label used in API responses.
    pub fn label(&self) -> &'static str {
        match self {
            ChainStatus::Completed => "ok",
            ChainStatus::Timeout => "timeout",
            ChainStatus::Failed(_) => "error",
        }
    }
}

/// Result of a chain run, returned to the caller instead of an error.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub status: ChainStatus,
    pub last_task: TaskId,
    pub total_attempts: u32,
    pub tasks_visited: usize,
    pub elapsed: Duration,
}

impl ChainSummary {
    /// Human-readable one-liner.
    pub fn message(&self) -> String {
        match &self.status {
            ChainStatus::Completed => format!(
                "Chain completed after {} attempts across {} tasks",
                self.total_attempts, self.tasks_visited
            ),
            ChainStatus::Timeout => format!(
                "Watchdog expired while working on {} ({} attempts so far)",
                self.last_task, self.total_attempts
            ),
            ChainStatus::Failed(e) => format!("Chain failed on {}: {}", self.last_task, e),
        }
    }
}
