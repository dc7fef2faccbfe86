//! HTTP submission client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::payload::{normalize_payload, payload_preview};
use super::{OutcomeKind, StoredValueCache, Submission, SubmissionOutcome, Submitter};
use crate::chain::TaskId;
use crate::config::Credentials;
use crate::util::truncate_with_marker;

/// Bytes of a response body kept in the outcome.
const MAX_BODY_BYTES: usize = 4000;

/// Sends answers to quiz endpoints on behalf of one chain run.
pub struct SubmissionClient {
    http: Client,
    credentials: Credentials,
    store: StoredValueCache,
    timeout: Duration,
}

impl SubmissionClient {
    pub fn new(
        http: Client,
        credentials: Credentials,
        store: StoredValueCache,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            store,
            timeout,
        }
    }
}

#[async_trait]
impl Submitter for SubmissionClient {
    async fn submit(&self, submission: &Submission) -> SubmissionOutcome {
        let body = normalize_payload(submission.payload.clone(), &self.credentials, &self.store);

        tracing::info!(
            "Sending answer → POST {} {}",
            submission.endpoint,
            payload_preview(&body)
        );

        let response = match self
            .http
            .post(&submission.endpoint)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("Request timeout after {:?}: {}", self.timeout, e)
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    format!("Request failed: {}", e)
                };
                tracing::warn!("Submission to {} failed: {}", submission.endpoint, message);
                return SubmissionOutcome::transport(message);
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Failed to read submission response body: {}", e);
                return SubmissionOutcome::transport(format!("Failed to read response: {}", e));
            }
        };

        let outcome = classify_response(status, &text);
        if outcome.is_error() {
            tracing::warn!(
                "Submission rejected (HTTP {}): {}",
                status,
                truncate_with_marker(&text, 500, "...")
            );
        } else {
            tracing::info!(
                "Submission response (HTTP {}): correct={:?} next={:?}",
                status,
                outcome.correct,
                outcome.proposed_next_task.as_ref().map(TaskId::as_str)
            );
        }
        outcome
    }
}

/// Classify a response into a [`SubmissionOutcome`].
///
/// JSON fields (`correct`, `url`, `reason`/`message`/`detail`) are read even
/// from non-2xx bodies so a server that rejects an answer can still propose
/// the next task.
pub fn classify_response(status: u16, body: &str) -> SubmissionOutcome {
    let success = (200..300).contains(&status);
    let json = serde_json::from_str::<Value>(body)
        .ok()
        .filter(Value::is_object);
    let stored_body = truncate_with_marker(body, MAX_BODY_BYTES, "...[truncated]");

    let Some(json) = json else {
        let kind = if success {
            OutcomeKind::NonJson { status }
        } else {
            OutcomeKind::HttpError { status }
        };
        let message = (!body.trim().is_empty())
            .then(|| truncate_with_marker(body.trim(), 500, "..."));
        return SubmissionOutcome {
            correct: None,
            proposed_next_task: None,
            server_message: message,
            kind,
            body: stored_body,
        };
    };

    let correct = json.get("correct").and_then(Value::as_bool);
    let proposed_next_task = json
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(TaskId::from);
    let server_message = ["reason", "message", "detail", "error"]
        .iter()
        .find_map(|k| json.get(*k).and_then(Value::as_str))
        .map(str::to_string);

    SubmissionOutcome {
        correct,
        proposed_next_task,
        server_message,
        kind: if success {
            OutcomeKind::Accepted { status }
        } else {
            OutcomeKind::HttpError { status }
        },
        body: stored_body,
    }
}
