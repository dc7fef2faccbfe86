//! Task chain driver: the control loop of one chain run.
//!
//! ```text
//! Running(seed) ──solver──▶ submit ──policy──┬─ RetrySame     ─▶ Running(same)
//!      ▲                                      ├─ AdvanceTo(n)  ─▶ Running(n)
//!      └──────────────────────────────────────┘  Terminate     ─▶ Completed
//! deadline passed at loop entry ─▶ Timeout
//! solver error / iteration cap  ─▶ Failed
//! delivery keeps failing        ─▶ Failed
//! ```

use std::time::Duration;

use super::{
    ChainError, ChainState, ChainStatus, ChainSummary, PolicyInput, RetryDecision,
    SubmissionPolicy, TaskId, TaskRegistry, TerminateReason,
};
use crate::agent::Solver;
use crate::clock::SharedClock;
use crate::config::ChainConfig;
use crate::submit::Submitter;

/// Runs chains under a watchdog deadline.
pub struct ChainDriver {
    policy: SubmissionPolicy,
    clock: SharedClock,
    watchdog: Duration,
    max_iterations: usize,
}

impl ChainDriver {
    pub fn new(config: &ChainConfig, clock: SharedClock) -> Self {
        Self {
            policy: SubmissionPolicy::new(config.thresholds),
            clock,
            watchdog: config.watchdog,
            max_iterations: config.max_iterations,
        }
    }

    /// Follow the chain from `seed` until it completes, times out or fails.
    ///
    /// `registry` is reset first, so each call starts from a clean slate. The
    /// watchdog is checked only at loop entry: an in-flight model call or
    /// submission is allowed to finish.
    pub async fn run(
        &self,
        seed: TaskId,
        registry: &mut TaskRegistry,
        solver: &mut dyn Solver,
        submitter: &dyn Submitter,
    ) -> ChainSummary {
        let started = self.clock.now();
        let mut state = ChainState::new(seed, started + self.watchdog);
        registry.reset();
        registry.observe(&state.current_task);

        tracing::info!(
            "Starting chain at {} (watchdog {:?})",
            state.current_task,
            self.watchdog
        );

        let mut iterations = 0usize;
        let status = loop {
            if self.clock.now() >= state.deadline {
                tracing::warn!(
                    "Watchdog expired on {} after {:?}",
                    state.current_task,
                    self.clock.since(started)
                );
                break ChainStatus::Timeout;
            }
            if iterations >= self.max_iterations {
                tracing::error!("Iteration limit {} reached", self.max_iterations);
                break ChainStatus::Failed(ChainError::IterationLimit(self.max_iterations));
            }
            iterations += 1;

            let current = state.current_task.clone();
            let submission = match solver.next_submission(&current).await {
                Ok(submission) => submission,
                Err(e) => {
                    tracing::error!("Solver failed on {}: {}", current, e);
                    break ChainStatus::Failed(e.into());
                }
            };

            let attempts_on_current = registry.attempts(&current);
            registry.record_attempt(&current);

            let outcome = submitter.submit(&submission).await;

            let waiting_on_next = outcome
                .proposed_next_task
                .as_ref()
                .and_then(|next| registry.elapsed_since(next));
            let input = PolicyInput {
                correct: outcome.correct,
                proposed_next_task: outcome.proposed_next_task.clone(),
                delay_since_task_start: registry.elapsed_since(&current).unwrap_or_default(),
                waiting_on_next,
                attempts_on_current,
                delivery_failed: outcome.is_error(),
            };
            let verdict = self.policy.evaluate(&input);
            tracing::info!(
                "Task {} attempt {}: correct={:?} delay={:?} -> {:?} (trigger {:?})",
                current,
                attempts_on_current + 1,
                input.correct,
                input.delay_since_task_start,
                verdict.decision,
                verdict.trigger
            );

            solver.observe_outcome(&current, &outcome, &verdict.decision);

            match verdict.decision {
                RetryDecision::RetrySame => {
                    if let Some(next) = &outcome.proposed_next_task {
                        registry.observe(next);
                    }
                }
                RetryDecision::AdvanceTo(next) => {
                    registry.observe(&next);
                    state.current_task = next;
                }
                RetryDecision::Terminate(TerminateReason::ChainComplete) => {
                    tracing::info!("Chain ended on {}: chain complete", current);
                    break ChainStatus::Completed;
                }
                RetryDecision::Terminate(TerminateReason::DeliveryFailed) => {
                    tracing::error!(
                        "Giving up on {}: submission to {} kept failing",
                        current,
                        submission.endpoint
                    );
                    break ChainStatus::Failed(ChainError::Delivery {
                        endpoint: submission.endpoint,
                        message: outcome.server_message.unwrap_or(outcome.body),
                    });
                }
            }
        };

        let summary = ChainSummary {
            status,
            last_task: state.current_task,
            total_attempts: registry.total_attempts(),
            tasks_visited: registry.len(),
            elapsed: self.clock.since(started),
        };
        tracing::info!("{}", summary.message());
        summary
    }
}
