//! Prompt text for the quiz solver.

use crate::chain::{RetryDecision, TaskId, TerminateReason};
use crate::submit::{SubmissionOutcome, STORED_PREFIX};
use crate::tools::SUBMIT_TOOL;

/// System prompt. Identity fields are injected by the submission client, so
/// the model never sees the secret.
pub fn system_prompt() -> String {
    format!(
        r#"You are an autonomous quiz-solving agent.

Each task is a web page (its URL is the task id) that describes a question and
the endpoint where the answer must be submitted.

Rules:
- Fetch the task page with render_page and read it carefully.
- Use download_file, run_code, ocr_image, transcribe_audio and encode_image when the task needs them.
- Compute the correct answer.
- NEVER explain. NEVER use markdown.
- ALWAYS submit with the {submit} tool, using the exact endpoint shown on the page.
- The payload is a JSON object with "url" (the task URL) and "answer".
- If unsure, submit "SKIP" as the answer.
- If a tool returns {stored}<key>, submit that placeholder as the answer unchanged.
- Do not include email or secret; they are added automatically."#,
        submit = SUBMIT_TOOL,
        stored = STORED_PREFIX,
    )
}

/// First user turn for a task.
pub fn task_prompt(task: &TaskId) -> String {
    format!("Solve the task at URL: {}", task)
}

/// Tool result text for a submission.
pub fn outcome_report(outcome: &SubmissionOutcome, decision: &RetryDecision) -> String {
    let correct = match outcome.correct {
        Some(true) => "correct",
        Some(false) => "incorrect",
        None => "unknown",
    };
    let mut report = format!("Submission result: {}", correct);
    if let Some(status) = outcome.status() {
        report.push_str(&format!(" (HTTP {})", status));
    } else if outcome.is_error() {
        report.push_str(" (not delivered)");
    }
    if let Some(message) = &outcome.server_message {
        report.push_str(&format!("\nServer says: {}", message));
    }
    if let Some(next) = &outcome.proposed_next_task {
        report.push_str(&format!("\nNext task: {}", next));
    }
    report.push_str(&format!("\nDecision: {}", decision_text(decision)));
    report
}

fn decision_text(decision: &RetryDecision) -> String {
    match decision {
        RetryDecision::RetrySame => "retry the same task".to_string(),
        RetryDecision::AdvanceTo(next) => format!("move on to {}", next),
        RetryDecision::Terminate(TerminateReason::ChainComplete) => "chain finished".to_string(),
        RetryDecision::Terminate(TerminateReason::DeliveryFailed) => {
            "stop: the answer could not be delivered".to_string()
        }
    }
}

/// User turn asking for another try on the same task.
pub fn retry_prompt(task: &TaskId, outcome: &SubmissionOutcome) -> String {
    match &outcome.server_message {
        Some(message) => format!(
            "That answer was not accepted ({}). Try again on {}.",
            message, task
        ),
        None => format!("That answer was not accepted. Try again on {}.", task),
    }
}

/// Nudge after a model turn with no tool call.
pub fn nudge_prompt(task: &TaskId) -> String {
    format!(
        "Use the tools. When you know the answer for {}, call {}.",
        task, SUBMIT_TOOL
    )
}
