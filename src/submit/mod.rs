//! Submission edge: outbound answer requests and their classified outcomes.
//!
//! - `payload`: identity injection and stored-value placeholder expansion
//! - `store`: per-run cache behind `STORED:<key>` placeholders
//! - `client`: HTTP submission with outcome classification

mod client;
mod payload;
mod store;

pub use client::{classify_response, SubmissionClient};
pub use payload::{normalize_payload, payload_preview, STORED_PREFIX};
pub use store::StoredValueCache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::TaskId;

/// An answer the solver wants sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Endpoint named on the task page.
    pub endpoint: String,
    /// Answer payload as produced by the model (untrusted).
    pub payload: serde_json::Value,
}

/// How a submission request ended at the transport level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// 2xx with a JSON body.
    Accepted { status: u16 },
    /// 2xx with a body that is not a JSON object.
    NonJson { status: u16 },
    /// Non-2xx response.
    HttpError { status: u16 },
    /// The request never produced a response.
    Transport,
}

/// Result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    /// `None` when the server did not state correctness.
    pub correct: Option<bool>,
    /// Next task proposed by the server; `None` means end of chain.
    pub proposed_next_task: Option<TaskId>,
    pub server_message: Option<String>,
    #[serde(flatten)]
    pub kind: OutcomeKind,
    /// Raw response body (or transport error text).
    pub body: String,
}

impl SubmissionOutcome {
    /// Outcome for a request that failed before any response arrived.
    pub fn transport(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            correct: None,
            proposed_next_task: None,
            server_message: Some(error.clone()),
            kind: OutcomeKind::Transport,
            body: error,
        }
    }

    /// Whether the request failed at the HTTP or transport level.
    pub fn is_error(&self) -> bool {
        matches!(
            self.kind,
            OutcomeKind::HttpError { .. } | OutcomeKind::Transport
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            OutcomeKind::Accepted { status }
            | OutcomeKind::NonJson { status }
            | OutcomeKind::HttpError { status } => Some(status),
            OutcomeKind::Transport => None,
        }
    }
}

/// Something that can deliver a submission.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Send `submission`. Failures are reported in the outcome, never raised.
    async fn submit(&self, submission: &Submission) -> SubmissionOutcome;
}
