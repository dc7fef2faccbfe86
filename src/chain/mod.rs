//! Task chain execution.
//!
//! - `registry`: per-task first-seen time and attempt counts
//! - `policy`: pure retry / advance / terminate decision
//! - `driver`: the loop that ties solver, submitter and policy together

mod driver;
mod policy;
mod registry;
mod types;

pub use driver::ChainDriver;
pub use policy::{AdvanceReason, PolicyInput, PolicyThresholds, PolicyVerdict, SubmissionPolicy};
pub use registry::TaskRegistry;
pub use types::{
    ChainError, ChainState, ChainStatus, ChainSummary, RetryDecision, TaskId, TerminateReason,
};
