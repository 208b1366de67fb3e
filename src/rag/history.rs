use log::error;
use thiserror::Error;

use crate::debug::DebugTrace;
use crate::llm::chat::PromptMessage;
use crate::models::chat::{ Message, Role };

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("message {index} ({role:?}) has no content")]
    EmptyContent {
        index: usize,
        role: Role,
    },
}

pub fn to_prompt_message(index: usize, msg: &Message) -> Result<PromptMessage, HistoryError> {
    if msg.content.trim().is_empty() {
        return Err(HistoryError::EmptyContent { index, role: msg.role });
    }
    Ok(match msg.role {
        Role::User => PromptMessage::human(msg.content.clone()),
        _ => PromptMessage::assistant(msg.content.clone()),
    })
}

/// Converts prior turns (everything except the message being answered) into
/// prompt messages, keeping their order. Unlike retrieval, a failure here is
/// returned to the caller once it has been written to the trace.
pub fn format_chat_history(
    history: &[Message],
    trace: &mut DebugTrace
) -> Result<Vec<PromptMessage>, HistoryError> {
    let formatted = history
        .iter()
        .enumerate()
        .map(|(i, m)| to_prompt_message(i, m))
        .collect::<Result<Vec<_>, _>>();

    match formatted {
        Ok(messages) => {
            trace.intermediate_values.formatted_messages = Some(messages.clone());
            Ok(messages)
        }
        Err(e) => {
            error!("[{}] chat history formatting failed: {}", trace.request_id(), e);
            trace.record_error("format_chat_history_error", e.to_string());
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::ConfigInfo;
    use crate::llm::chat::MessageKind;

    fn trace() -> DebugTrace {
        DebugTrace::new(ConfigInfo {
            openai_model: "m".into(),
            openai_temperature: 0.2,
            embedding_model: "e".into(),
            embedding_dimensions: 8,
            vector_type: "qdrant".into(),
            vector_index: None,
            supabase_url: None,
        })
    }

    #[test]
    fn roles_map_in_order() {
        let history = vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("price?"),
        ];
        let mut t = trace();
        let out = format_chat_history(&history, &mut t).unwrap();

        let kinds: Vec<_> = out.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::Human, MessageKind::Assistant, MessageKind::Human]);
        assert_eq!(out[2].content, "price?");
        assert_eq!(t.intermediate_values.formatted_messages.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn non_user_roles_become_assistant() {
        let history = vec![Message { role: Role::Other, content: "note".into() }];
        let mut t = trace();
        let out = format_chat_history(&history, &mut t).unwrap();
        assert_eq!(out, vec![PromptMessage::assistant("note")]);
    }

    #[test]
    fn empty_history_is_fine() {
        let mut t = trace();
        assert!(format_chat_history(&[], &mut t).unwrap().is_empty());
    }

    #[test]
    fn blank_message_fails_and_is_recorded() {
        let history = vec![Message::user("hi"), Message::assistant("   ")];
        let mut t = trace();
        let err = format_chat_history(&history, &mut t).unwrap_err();

        assert_eq!(err, HistoryError::EmptyContent { index: 1, role: Role::Assistant });
        assert!(t.errors().contains_key("format_chat_history_error"));
        assert!(t.intermediate_values.formatted_messages.is_none());
    }
}
