//! Model-driven solver: the model ↔ tool loop behind each submission.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::prompt::{nudge_prompt, outcome_report, retry_prompt, system_prompt, task_prompt};
use super::{Solver, SolverError};
use crate::chain::{RetryDecision, TaskId};
use crate::config::AgentConfig;
use crate::llm::{
    trim_conversation, ChatMessage, ChatOptions, LlmClient, Role, ToolCall, ToolDefinition,
};
use crate::submit::{Submission, SubmissionOutcome};
use crate::tools::{self, ToolBox, ToolRequest};
use crate::util::truncate_with_marker;

/// Bytes of a single tool result kept in the conversation.
const MAX_TOOL_RESULT_BYTES: usize = 8000;

/// Solver backed by a chat model and the tool box.
///
/// Owns one conversation per chain run. A `submit_answer` call suspends the
/// tool loop: the submission goes back to the driver, and the tool result for
/// that call is written once the outcome is known.
pub struct LlmSolver {
    llm: Arc<dyn LlmClient>,
    model: String,
    options: ChatOptions,
    tools: ToolBox,
    definitions: Vec<ToolDefinition>,
    messages: Vec<ChatMessage>,
    max_context_tokens: usize,
    max_steps: usize,
    active_task: Option<TaskId>,
    /// Tool call id of the submission awaiting its outcome.
    pending_submit: Option<String>,
}

impl LlmSolver {
    pub fn new(llm: Arc<dyn LlmClient>, model: String, config: &AgentConfig, tools: ToolBox) -> Self {
        Self {
            llm,
            model,
            options: ChatOptions {
                temperature: Some(0.0),
                max_tokens: Some(config.max_output_tokens),
            },
            tools,
            definitions: tools::definitions(),
            messages: vec![ChatMessage::system(system_prompt())],
            max_context_tokens: config.max_context_tokens,
            max_steps: config.max_model_steps,
            active_task: None,
            pending_submit: None,
        }
    }

    /// Conversation so far.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push_tool_result(&mut self, call_id: &str, content: String) {
        let content = truncate_with_marker(&content, MAX_TOOL_RESULT_BYTES, "\n...[truncated]");
        self.messages.push(ChatMessage::tool_result(call_id, content));
    }

    /// Run the calls of one assistant turn in order. Stops at the first
    /// submission; calls after it are answered as skipped.
    async fn run_tool_calls(
        &mut self,
        task: &TaskId,
        calls: &[ToolCall],
    ) -> Option<Submission> {
        let mut submission = None;
        for call in calls {
            if submission.is_some() {
                self.push_tool_result(
                    &call.id,
                    "Skipped: an answer was submitted in this turn".to_string(),
                );
                continue;
            }

            tracing::debug!(
                "Tool call {} args={}",
                call.function.name,
                truncate_with_marker(&call.function.arguments, 200, "...")
            );
            let request = match ToolRequest::from_call(&call.function.name, &call.function.arguments) {
                Ok(request) => request,
                Err(e) => {
                    self.push_tool_result(&call.id, format!("Error: {}", e));
                    continue;
                }
            };

            match request {
                ToolRequest::SubmitAnswer { url, payload } => {
                    self.pending_submit = Some(call.id.clone());
                    submission = Some(Submission {
                        endpoint: resolve_endpoint(task, &url),
                        payload: with_task_url(payload, task),
                    });
                }
                other => {
                    let result = match self.tools.execute(&other).await {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!("Tool {} failed: {}", other.name(), e);
                            format!("Error: {}", e)
                        }
                    };
                    self.push_tool_result(&call.id, result);
                }
            }
        }
        submission
    }
}

/// Endpoints may be given relative to the task page.
fn resolve_endpoint(task: &TaskId, endpoint: &str) -> String {
    url::Url::parse(task.as_str())
        .and_then(|base| base.join(endpoint.trim()))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| endpoint.trim().to_string())
}

/// Object payloads without a `url` get the current task's.
fn with_task_url(payload: Value, task: &TaskId) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.entry("url")
                .or_insert_with(|| Value::String(task.to_string()));
            Value::Object(map)
        }
        other => other,
    }
}

#[async_trait]
impl Solver for LlmSolver {
    async fn next_submission(&mut self, task: &TaskId) -> Result<Submission, SolverError> {
        if let Some(call_id) = self.pending_submit.take() {
            self.push_tool_result(&call_id, "No result recorded for this submission".to_string());
        }
        if self.active_task.as_ref() != Some(task) {
            tracing::info!("Solver starting task {}", task);
            self.messages.push(ChatMessage::user(task_prompt(task)));
            self.active_task = Some(task.clone());
        }

        for step in 0..self.max_steps {
            let messages = std::mem::take(&mut self.messages);
            self.messages = trim_conversation(messages, self.max_context_tokens, task);

            tracing::debug!(
                "Model step {} for {} ({} messages)",
                step + 1,
                task,
                self.messages.len()
            );
            let response = self
                .llm
                .chat_completion_with_options(
                    &self.model,
                    &self.messages,
                    Some(self.definitions.as_slice()),
                    self.options.clone(),
                )
                .await
                .map_err(|e| SolverError::Model(e.to_string()))?;
            tracing::debug!(
                "Model {} finished with {:?} ({} tokens)",
                response.model.as_deref().unwrap_or(&self.model),
                response.finish_reason,
                response.usage.as_ref().map_or(0, |u| u.total_tokens)
            );

            if let Some(calls) = response.requested_tools() {
                let calls = calls.to_vec();
                self.messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    calls.clone(),
                ));
                if let Some(submission) = self.run_tool_calls(task, &calls).await {
                    return Ok(submission);
                }
                continue;
            }

            let text = response.content.unwrap_or_default();
            tracing::debug!(
                "Model replied without tool calls: {}",
                truncate_with_marker(&text, 200, "...")
            );
            if !text.trim().is_empty() {
                self.messages.push(ChatMessage::new(Role::Assistant, text));
            }
            self.messages.push(ChatMessage::user(nudge_prompt(task)));
        }

        tracing::warn!("Solver gave up on {} after {} steps", task, self.max_steps);
        Err(SolverError::StepLimit(self.max_steps))
    }

    fn observe_outcome(
        &mut self,
        task: &TaskId,
        outcome: &SubmissionOutcome,
        decision: &RetryDecision,
    ) {
        let report = outcome_report(outcome, decision);
        match self.pending_submit.take() {
            Some(call_id) => self.push_tool_result(&call_id, report),
            None => self.messages.push(ChatMessage::user(report)),
        }
        if *decision == RetryDecision::RetrySame {
            self.messages.push(ChatMessage::user(retry_prompt(task, outcome)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall};
    use crate::submit::{classify_response, StoredValueCache};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent.
    struct ScriptedLlm {
        responses: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<anyhow::Result<ChatResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> anyhow::Result<ChatResponse> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatResponse::default()))
        }
    }

    fn call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: args.to_string(),
            },
        }
    }

    fn tool_turn(calls: Vec<ToolCall>) -> anyhow::Result<ChatResponse> {
        Ok(ChatResponse {
            tool_calls: Some(calls),
            ..ChatResponse::default()
        })
    }

    fn text_turn(text: &str) -> anyhow::Result<ChatResponse> {
        Ok(ChatResponse {
            content: Some(text.into()),
            ..ChatResponse::default()
        })
    }

    fn solver(llm: Arc<ScriptedLlm>, workspace: &std::path::Path) -> LlmSolver {
        let config = AgentConfig {
            workspace_path: workspace.to_path_buf(),
            max_model_steps: 4,
            ..AgentConfig::default()
        };
        let tools = ToolBox::new(&config, reqwest::Client::new(), StoredValueCache::new());
        LlmSolver::new(llm, "test/model".into(), &config, tools)
    }

    fn task() -> TaskId {
        TaskId::from("https://quiz.example/t1")
    }

    #[test]
    fn relative_endpoints_resolve_against_task() {
        assert_eq!(resolve_endpoint(&task(), "/submit"), "https://quiz.example/submit");
        assert_eq!(
            resolve_endpoint(&task(), "https://other.example/s"),
            "https://other.example/s"
        );
        assert_eq!(resolve_endpoint(&TaskId::from("t1"), "/submit"), "/submit");
    }

    #[test]
    fn task_url_is_added_when_missing() {
        let p = with_task_url(serde_json::json!({"answer": 1}), &task());
        assert_eq!(p["url"], "https://quiz.example/t1");
        let p = with_task_url(serde_json::json!({"answer": 1, "url": "x"}), &task());
        assert_eq!(p["url"], "x");
        assert_eq!(with_task_url(serde_json::json!(3), &task()), serde_json::json!(3));
    }

    #[tokio::test]
    async fn submit_call_becomes_a_submission() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![tool_turn(vec![call(
            "c1",
            "submit_answer",
            serde_json::json!({"url": "/submit", "payload": {"answer": 4}}),
        )])]);
        let mut solver = solver(llm.clone(), dir.path());

        let submission = solver.next_submission(&task()).await.unwrap();
        assert_eq!(submission.endpoint, "https://quiz.example/submit");
        assert_eq!(submission.payload["answer"], 4);
        assert_eq!(submission.payload["url"], "https://quiz.example/t1");

        let seen = llm.seen.lock().unwrap();
        let first_call = &seen[0];
        assert_eq!(first_call[0].role, Role::System);
        assert_eq!(
            first_call[1].text_content(),
            Some("Solve the task at URL: https://quiz.example/t1")
        );
    }

    #[tokio::test]
    async fn tool_errors_go_back_to_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![
            tool_turn(vec![call("c1", "ocr_image", serde_json::json!({"path": "missing.png"}))]),
            tool_turn(vec![call(
                "c2",
                "submit_answer",
                serde_json::json!({"url": "https://quiz.example/submit", "payload": {"answer": "SKIP"}}),
            )]),
        ]);
        let mut solver = solver(llm.clone(), dir.path());

        solver.next_submission(&task()).await.unwrap();
        let tool_msg = solver
            .messages()
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("c1"))
            .unwrap();
        assert!(tool_msg.text_content().unwrap().starts_with("Error: File not found"));
    }

    #[tokio::test]
    async fn text_replies_are_nudged_until_step_limit() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![
            text_turn("The answer is 4"),
            text_turn("4"),
            text_turn("4"),
            text_turn("4"),
        ]);
        let mut solver = solver(llm.clone(), dir.path());

        let err = solver.next_submission(&task()).await.unwrap_err();
        assert_eq!(err, SolverError::StepLimit(4));
        let last = solver.messages().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.text_content().unwrap().contains("submit_answer"));
    }

    #[tokio::test]
    async fn model_failure_is_a_solver_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![Err(anyhow::anyhow!("401 bad key"))]);
        let mut solver = solver(llm, dir.path());

        let err = solver.next_submission(&task()).await.unwrap_err();
        assert!(matches!(err, SolverError::Model(ref m) if m.contains("bad key")));
    }

    #[tokio::test]
    async fn outcome_feedback_is_written_and_retry_prompted() {
        let dir = tempfile::tempdir().unwrap();
        let submit = |id: &str| {
            tool_turn(vec![call(
                id,
                "submit_answer",
                serde_json::json!({"url": "https://quiz.example/submit", "payload": {"answer": 1}}),
            )])
        };
        let llm = ScriptedLlm::new(vec![submit("c1"), submit("c2")]);
        let mut solver = solver(llm.clone(), dir.path());

        solver.next_submission(&task()).await.unwrap();
        let outcome = classify_response(200, r#"{"correct": false, "reason": "expected 2"}"#);
        solver.observe_outcome(&task(), &outcome, &RetryDecision::RetrySame);
        solver.next_submission(&task()).await.unwrap();

        let seen = llm.seen.lock().unwrap();
        let second_call = &seen[1];
        let report = second_call
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("c1"))
            .unwrap();
        assert!(report.text_content().unwrap().contains("expected 2"));
        let last = second_call.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.text_content().unwrap().contains("Try again"));
    }

    #[tokio::test]
    async fn calls_after_a_submission_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let llm = ScriptedLlm::new(vec![tool_turn(vec![
            call(
                "c1",
                "submit_answer",
                serde_json::json!({"url": "https://quiz.example/submit", "payload": {"answer": 1}}),
            ),
            call("c2", "run_code", serde_json::json!({"code": "print(1)"})),
        ])]);
        let mut solver = solver(llm, dir.path());

        solver.next_submission(&task()).await.unwrap();
        let skipped = solver
            .messages()
            .iter()
            .find(|m| m.tool_call_id.as_deref() == Some("c2"))
            .unwrap();
        assert!(skipped.text_content().unwrap().starts_with("Skipped"));
    }
}
