//! Submission policy: what to do after one submission attempt.
//!
//! The policy is a pure function of the outcome and timings; it never touches
//! the registry. The driver gathers the inputs and applies the decision.
//!
//! ```text
//! not delivered, no next task -> RetrySame until retry_limit or slow,
//!                                then Terminate(DeliveryFailed)
//! next task absent            -> Terminate(ChainComplete)
//! correct                     -> AdvanceTo(next)
//! attempts >= retry_limit  \
//! delay    >= slow          |-> AdvanceTo(next)
//! waiting  >  stale (known)/
//! otherwise                   -> RetrySame
//! ```

use std::time::Duration;

use serde::Serialize;

use super::{RetryDecision, TaskId, TerminateReason};

/// Thresholds that bound time spent stuck on one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyThresholds {
    /// Attempts on one task after which retries are abandoned.
    pub retry_limit: u32,
    /// Per-task time budget measured from when the task was first observed.
    pub slow_threshold: Duration,
    /// How long an already-proposed next task may wait.
    pub next_stale_threshold: Duration,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            retry_limit: 4,
            slow_threshold: Duration::from_secs(180),
            next_stale_threshold: Duration::from_secs(90),
        }
    }
}

/// Everything the policy needs to know about one submission.
#[derive(Debug, Clone)]
pub struct PolicyInput {
    /// `None` when the server did not say.
    pub correct: Option<bool>,
    /// `None` signals end of chain.
    pub proposed_next_task: Option<TaskId>,
    /// Time since the current task was first observed.
    pub delay_since_task_start: Duration,
    /// Time since the proposed task was first observed; `None` if it was not
    /// seen before this submission.
    pub waiting_on_next: Option<Duration>,
    /// Attempts already made on the current task, not counting this one.
    pub attempts_on_current: u32,
    /// The request failed at the transport or HTTP level, so a missing next
    /// task is not a verdict from the server.
    pub delivery_failed: bool,
}

/// Which condition ended work on the current task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceReason {
    Correct,
    RetryLimit,
    Slow,
    StaleNext,
}

/// Decision plus the trigger behind it (for logging).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub decision: RetryDecision,
    pub trigger: Option<AdvanceReason>,
}

/// Retry/advance/terminate policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionPolicy {
    thresholds: PolicyThresholds,
}

impl SubmissionPolicy {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    pub fn decide(&self, input: &PolicyInput) -> RetryDecision {
        self.evaluate(input).decision
    }

    pub fn evaluate(&self, input: &PolicyInput) -> PolicyVerdict {
        let Some(next) = input.proposed_next_task.clone() else {
            if input.delivery_failed {
                return self.after_failed_delivery(input);
            }
            return PolicyVerdict {
                decision: RetryDecision::Terminate(TerminateReason::ChainComplete),
                trigger: None,
            };
        };

        if input.correct == Some(true) {
            return PolicyVerdict {
                decision: RetryDecision::AdvanceTo(next),
                trigger: Some(AdvanceReason::Correct),
            };
        }

        match self.abandon_trigger(input) {
            Some(trigger) => PolicyVerdict {
                decision: RetryDecision::AdvanceTo(next),
                trigger: Some(trigger),
            },
            None => PolicyVerdict {
                decision: RetryDecision::RetrySame,
                trigger: None,
            },
        }
    }

    /// A failed delivery is a failed attempt: retry under the same limits,
    /// then stop without claiming the chain completed.
    fn after_failed_delivery(&self, input: &PolicyInput) -> PolicyVerdict {
        match self.abandon_trigger(input) {
            Some(trigger) => PolicyVerdict {
                decision: RetryDecision::Terminate(TerminateReason::DeliveryFailed),
                trigger: Some(trigger),
            },
            None => PolicyVerdict {
                decision: RetryDecision::RetrySame,
                trigger: None,
            },
        }
    }

    fn abandon_trigger(&self, input: &PolicyInput) -> Option<AdvanceReason> {
        let t = &self.thresholds;
        if input.attempts_on_current >= t.retry_limit {
            return Some(AdvanceReason::RetryLimit);
        }
        if input.delay_since_task_start >= t.slow_threshold {
            return Some(AdvanceReason::Slow);
        }
        match input.waiting_on_next {
            Some(waiting) if waiting > t.next_stale_threshold => Some(AdvanceReason::StaleNext),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(correct: Option<bool>, next: Option<&str>) -> PolicyInput {
        PolicyInput {
            correct,
            proposed_next_task: next.map(TaskId::from),
            delay_since_task_start: Duration::from_secs(5),
            waiting_on_next: None,
            attempts_on_current: 0,
            delivery_failed: false,
        }
    }

    #[test]
    fn missing_next_task_terminates_regardless_of_correctness() {
        let policy = SubmissionPolicy::default();
        for correct in [Some(true), Some(false), None] {
            assert_eq!(
                policy.decide(&input(correct, None)),
                RetryDecision::Terminate(TerminateReason::ChainComplete)
            );
        }
    }

    #[test]
    fn correct_answer_always_advances() {
        let policy = SubmissionPolicy::default();
        let mut i = input(Some(true), Some("t2"));
        i.attempts_on_current = 0;
        let verdict = policy.evaluate(&i);
        assert_eq!(verdict.decision, RetryDecision::AdvanceTo("t2".into()));
        assert_eq!(verdict.trigger, Some(AdvanceReason::Correct));
    }

    #[test]
    fn incorrect_under_thresholds_retries() {
        let policy = SubmissionPolicy::default();
        assert_eq!(
            policy.decide(&input(Some(false), Some("t2"))),
            RetryDecision::RetrySame
        );
        assert_eq!(policy.decide(&input(None, Some("t2"))), RetryDecision::RetrySame);
    }

    #[test]
    fn retry_limit_boundary() {
        let policy = SubmissionPolicy::default();
        let limit = policy.thresholds().retry_limit;

        let mut i = input(Some(false), Some("t2"));
        i.attempts_on_current = limit - 1;
        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);

        i.attempts_on_current = limit;
        let verdict = policy.evaluate(&i);
        assert_eq!(verdict.decision, RetryDecision::AdvanceTo("t2".into()));
        assert_eq!(verdict.trigger, Some(AdvanceReason::RetryLimit));
    }

    #[test]
    fn slow_task_advances_before_retry_limit() {
        let policy = SubmissionPolicy::default();
        let mut i = input(Some(false), Some("t2"));
        i.delay_since_task_start = Duration::from_secs(181);
        let verdict = policy.evaluate(&i);
        assert_eq!(verdict.decision, RetryDecision::AdvanceTo("t2".into()));
        assert_eq!(verdict.trigger, Some(AdvanceReason::Slow));

        i.delay_since_task_start = Duration::from_secs(180);
        assert_eq!(policy.decide(&i), RetryDecision::AdvanceTo("t2".into()));

        i.delay_since_task_start = Duration::from_secs(179);
        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);
    }

    #[test]
    fn stale_next_only_counts_when_known_and_strictly_over() {
        let policy = SubmissionPolicy::default();
        let mut i = input(None, Some("t2"));

        i.waiting_on_next = None;
        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);

        i.waiting_on_next = Some(Duration::from_secs(90));
        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);

        i.waiting_on_next = Some(Duration::from_secs(91));
        let verdict = policy.evaluate(&i);
        assert_eq!(verdict.decision, RetryDecision::AdvanceTo("t2".into()));
        assert_eq!(verdict.trigger, Some(AdvanceReason::StaleNext));
    }

    #[test]
    fn custom_thresholds_are_respected() {
        let policy = SubmissionPolicy::new(PolicyThresholds {
            retry_limit: 1,
            slow_threshold: Duration::from_secs(10),
            next_stale_threshold: Duration::from_secs(5),
        });
        let mut i = input(Some(false), Some("t2"));
        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);
        i.attempts_on_current = 1;
        assert_eq!(policy.decide(&i), RetryDecision::AdvanceTo("t2".into()));
    }

    #[test]
    fn failed_delivery_retries_then_terminates_as_failure() {
        let policy = SubmissionPolicy::default();
        let limit = policy.thresholds().retry_limit;
        let mut i = input(None, None);
        i.delivery_failed = true;

        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);

        i.attempts_on_current = limit;
        let verdict = policy.evaluate(&i);
        assert_eq!(
            verdict.decision,
            RetryDecision::Terminate(TerminateReason::DeliveryFailed)
        );
        assert_eq!(verdict.trigger, Some(AdvanceReason::RetryLimit));

        i.attempts_on_current = 0;
        i.delay_since_task_start = Duration::from_secs(180);
        assert_eq!(
            policy.decide(&i),
            RetryDecision::Terminate(TerminateReason::DeliveryFailed)
        );
    }

    #[test]
    fn failed_delivery_with_next_task_follows_normal_rules() {
        let policy = SubmissionPolicy::default();
        let mut i = input(Some(false), Some("t2"));
        i.delivery_failed = true;
        assert_eq!(policy.decide(&i), RetryDecision::RetrySame);
        i.attempts_on_current = policy.thresholds().retry_limit;
        assert_eq!(policy.decide(&i), RetryDecision::AdvanceTo("t2".into()));
    }
}
