//! Solver: turns a task into one submission at a time.
//!
//! The chain driver owns the loop; a [`Solver`] only answers "what should be
//! submitted for this task now?" and is told what happened afterwards.

mod prompt;
mod solver;

pub use prompt::system_prompt;
pub use solver::LlmSolver;

use async_trait::async_trait;

use crate::chain::{RetryDecision, TaskId};
use crate::submit::{Submission, SubmissionOutcome};

/// Failure that ends a chain run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("No submission after {0} model steps")]
    StepLimit(usize),
}

/// Produces submissions for the chain driver.
#[async_trait]
pub trait Solver: Send {
    /// Work on `task` until there is something to submit.
    async fn next_submission(&mut self, task: &TaskId) -> Result<Submission, SolverError>;

    /// Feedback for the submission most recently returned.
    fn observe_outcome(
        &mut self,
        task: &TaskId,
        outcome: &SubmissionOutcome,
        decision: &RetryDecision,
    );
}
