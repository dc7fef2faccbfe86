//! Conversation trimming to keep prompts under the model context budget.

use super::{ChatMessage, Role};
use crate::chain::TaskId;

/// Per-message overhead for role and framing.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Rough token estimate: about four characters per token.
pub fn estimate_tokens(message: &ChatMessage) -> usize {
    let mut chars = message.content.as_deref().map_or(0, |c| c.chars().count());
    if let Some(calls) = &message.tool_calls {
        for call in calls {
            chars += call.function.name.chars().count() + call.function.arguments.chars().count();
        }
    }
    chars / 4 + MESSAGE_OVERHEAD_TOKENS
}

fn total_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(estimate_tokens).sum()
}

/// Drop the oldest non-system turns until the estimate fits `max_tokens`.
///
/// System messages are always kept. The first retained non-system turn must
/// be a user turn so the provider never sees an orphaned tool result; if no
/// user turn survives, a short continuation prompt naming `task` is added.
pub fn trim_conversation(messages: Vec<ChatMessage>, max_tokens: usize, task: &TaskId) -> Vec<ChatMessage> {
    let (system, mut rest): (Vec<_>, Vec<_>) =
        messages.into_iter().partition(|m| m.role == Role::System);

    let system_tokens = total_tokens(&system);
    let mut rest_tokens = total_tokens(&rest);
    let mut drop = 0;
    while drop < rest.len() && system_tokens + rest_tokens > max_tokens {
        rest_tokens -= estimate_tokens(&rest[drop]);
        drop += 1;
    }

    let first_user = rest[drop..]
        .iter()
        .position(|m| m.role == Role::User)
        .map(|i| i + drop);

    let mut trimmed = system;
    match first_user {
        Some(start) => {
            if start > 0 {
                tracing::debug!("Trimmed {} conversation turns to fit context", start);
            }
            trimmed.extend(rest.drain(start..));
        }
        None => {
            tracing::debug!("No user turn left after trimming; adding continuation prompt");
            trimmed.push(ChatMessage::user(format!(
                "Continue solving URL: {}",
                task
            )));
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FunctionCall, ToolCall};

    fn task() -> TaskId {
        TaskId::from("https://quiz.example/t1")
    }

    #[test]
    fn estimate_counts_tool_call_arguments() {
        let plain = ChatMessage::user("x".repeat(40));
        assert_eq!(estimate_tokens(&plain), 14);

        let call = ChatMessage::assistant_tool_calls(
            None,
            vec![ToolCall {
                id: "c1".into(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: "run_code".into(),
                    arguments: "y".repeat(32),
                },
            }],
        );
        assert_eq!(estimate_tokens(&call), (8 + 32) / 4 + 4);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        // 40 three-byte characters.
        let wide = ChatMessage::user("€".repeat(40));
        assert_eq!(estimate_tokens(&wide), 40 / 4 + 4);
    }

    #[test]
    fn short_conversation_is_untouched() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("go")];
        let out = trim_conversation(messages, 1000, &task());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text_content(), Some("go"));
    }

    #[test]
    fn oldest_turns_are_dropped_and_system_kept() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("a".repeat(400)),
            ChatMessage::tool_result("c1", "b".repeat(400)),
            ChatMessage::user("latest"),
        ];
        let out = trim_conversation(messages, 50, &task());
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text_content(), Some("latest"));
    }

    #[test]
    fn leading_tool_results_are_not_kept() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("a".repeat(400)),
            ChatMessage::tool_result("c1", "short"),
            ChatMessage::user("next"),
        ];
        let out = trim_conversation(messages, 20, &task());
        assert!(out.iter().all(|m| m.role != Role::Tool));
    }

    #[test]
    fn continuation_prompt_added_when_no_user_turn_survives() {
        let messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("a".repeat(4000)),
            ChatMessage::tool_result("c1", "b".repeat(4000)),
        ];
        let out = trim_conversation(messages, 10, &task());
        let last = out.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(
            last.text_content(),
            Some("Continue solving URL: https://quiz.example/t1")
        );
    }
}
