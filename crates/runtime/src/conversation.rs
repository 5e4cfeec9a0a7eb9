//! Per-query transcript.

use crate::model::{Message, Role};
use crate::{Error, Result};

/// Append-only transcript for one query.
///
/// Starts with exactly a system and a user message. A tool result may only
/// answer a tool call that an earlier assistant message requested.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn seed(system_prompt: &str, query: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(query)],
        }
    }

    pub fn append_assistant(&mut self, message: Message) -> Result<()> {
        if message.role != Role::Assistant {
            return Err(Error::InvalidState(format!(
                "expected an assistant message, got {:?}",
                message.role
            )));
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn append_tool_result(
        &mut self,
        tool_call_id: &str,
        content: impl Into<String>,
    ) -> Result<()> {
        if !self.requested(tool_call_id) {
            return Err(Error::InvalidState(format!(
                "tool result for unknown call id {tool_call_id}"
            )));
        }
        self.messages.push(Message::tool_result(tool_call_id, content));
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn requested(&self, tool_call_id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| &m.tool_calls)
            .any(|call| call.id == tool_call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolCall;
    use serde_json::Map;

    fn add_call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "add".into(),
            arguments: Map::new(),
        }
    }

    #[test]
    fn seed_has_system_then_user() {
        let conversation = ConversationState::seed("be helpful", "add 2 and 3");
        let roles: Vec<_> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User]);
        assert_eq!(conversation.messages()[1].text(), "add 2 and 3");
    }

    #[test]
    fn appends_keep_call_order() {
        let mut conversation = ConversationState::seed("sys", "q");
        conversation
            .append_assistant(Message::assistant_with_tool_calls(None, vec![add_call("c1")]))
            .unwrap();
        conversation
            .append_assistant(Message::tool_call_echo(&add_call("c1")))
            .unwrap();
        conversation.append_tool_result("c1", "5").unwrap();

        let roles: Vec<_> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::User, Role::Assistant, Role::Assistant, Role::Tool]
        );
        assert_eq!(conversation.len(), 5);
    }

    #[test]
    fn tool_result_requires_earlier_call() {
        let mut conversation = ConversationState::seed("sys", "q");
        let err = conversation.append_tool_result("missing", "x").unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn only_assistant_messages_are_appended_as_assistant() {
        let mut conversation = ConversationState::seed("sys", "q");
        assert!(conversation.append_assistant(Message::user("sneaky")).is_err());
    }
}
