//! Conversation-to-transcript formatting
//!
//! Retool agents accept one text message per run, so the whole chat history is
//! flattened into a `Human:` / `Assistant:` transcript.

use crate::handlers::openai::types::{ChatMessage, MessageRole};

const HUMAN_LABEL: &str = "Human";
const ASSISTANT_LABEL: &str = "Assistant";

/// Flatten `messages` into a transcript
///
/// Each message becomes `"\n\n{label}: {content}"`. Only user turns are
/// labelled `Human`; system and assistant turns are both `Assistant`. When the
/// last turn is the assistant's, an empty `Human:` turn is appended so the
/// agent answers as the assistant.
pub fn format_conversation(messages: &[ChatMessage]) -> String {
    let mut prompt = String::with_capacity(
        messages
            .iter()
            .map(|m| m.content().len() + ASSISTANT_LABEL.len() + 4)
            .sum::<usize>()
            + HUMAN_LABEL.len()
            + 4,
    );

    for message in messages {
        let label = match message.role() {
            MessageRole::User => HUMAN_LABEL,
            MessageRole::Assistant | MessageRole::System => ASSISTANT_LABEL,
        };
        prompt.push_str("\n\n");
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(message.content());
    }

    if messages
        .last()
        .is_some_and(|m| m.role() == MessageRole::Assistant)
    {
        prompt.push_str("\n\n");
        prompt.push_str(HUMAN_LABEL);
        prompt.push_str(": ");
    }

    prompt
}
