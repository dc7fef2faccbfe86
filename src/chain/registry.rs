//! Per-task bookkeeping: first-seen time and attempt counter.
//!
//! # Invariants
//! - `first_seen_at` is written once per task and never changed until `reset()`
//! - `attempt_count` only grows, by exactly one per `record_attempt`

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::TaskId;
use crate::clock::SharedClock;

#[derive(Debug, Clone, Copy)]
struct TaskEntry {
    first_seen_at: Instant,
    attempt_count: u32,
}

/// Registry of tasks seen during one chain run.
///
/// One instance per run; never shared between concurrent chains.
pub struct TaskRegistry {
    clock: SharedClock,
    entries: HashMap<TaskId, TaskEntry>,
}

impl TaskRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            entries: HashMap::new(),
        }
    }

    /// Record the first-seen time of `task` if it is not known yet.
    pub fn observe(&mut self, task: &TaskId) {
        let now = self.clock.now();
        self.entries.entry(task.clone()).or_insert(TaskEntry {
            first_seen_at: now,
            attempt_count: 0,
        });
    }

    /// Attempts made so far on `task` (0 if never seen).
    pub fn attempts(&self, task: &TaskId) -> u32 {
        self.entries.get(task).map_or(0, |e| e.attempt_count)
    }

    /// Count one more submission for `task` and return the new total.
    pub fn record_attempt(&mut self, task: &TaskId) -> u32 {
        let now = self.clock.now();
        let entry = self.entries.entry(task.clone()).or_insert(TaskEntry {
            first_seen_at: now,
            attempt_count: 0,
        });
        entry.attempt_count += 1;
        entry.attempt_count
    }

    /// Time since `task` was first observed, or `None` if it never was.
    pub fn elapsed_since(&self, task: &TaskId) -> Option<Duration> {
        self.entries
            .get(task)
            .map(|e| self.clock.since(e.first_seen_at))
    }

    pub fn contains(&self, task: &TaskId) -> bool {
        self.entries.contains_key(task)
    }

    /// Number of distinct tasks seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of attempts over every task.
    pub fn total_attempts(&self) -> u32 {
        self.entries.values().map(|e| e.attempt_count).sum()
    }

    /// Forget every task. Called once at the start of each top-level run.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
