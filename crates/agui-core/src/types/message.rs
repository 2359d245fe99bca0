//! Message types for the AG-UI protocol.
//!
//! These are the entries of the conversation history carried by
//! `MESSAGES_SNAPSHOT` and produced by the run transcript.

use crate::types::ids::{MessageId, ToolCallId};
use crate::types::tool::ToolCall;
use serde::{Deserialize, Serialize};

/// A generated function call from a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,
    /// The arguments to pass to the function (JSON-encoded string).
    pub arguments: String,
}

/// Message role indicating the sender type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Developer messages, typically for debugging.
    Developer,
    /// System messages, usually containing system prompts.
    System,
    /// Assistant messages from the AI model.
    #[default]
    Assistant,
    /// User messages from the human user.
    User,
    /// Tool messages containing tool/function call results.
    Tool,
}

impl Role {
    /// Returns the wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Developer => "developer",
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the conversation history.
///
/// The `role` field is the discriminant on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// A developer message for debugging.
    Developer {
        id: MessageId,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A system message (usually the system prompt).
    System {
        id: MessageId,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// An assistant message from the model.
    Assistant {
        id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(rename = "toolCalls", default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    /// A user message from the human user.
    User {
        id: MessageId,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A tool message containing a tool call result.
    Tool {
        id: MessageId,
        content: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: ToolCallId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Message {
    /// Creates a new message with the given role, ID, and content.
    ///
    /// Tool messages created this way get a random `toolCallId`; use
    /// [`Message::tool_result`] to bind one explicitly.
    pub fn new(role: Role, id: impl Into<MessageId>, content: impl Into<String>) -> Self {
        let id = id.into();
        let content = content.into();
        match role {
            Role::Developer => Self::Developer {
                id,
                content,
                name: None,
            },
            Role::System => Self::System {
                id,
                content,
                name: None,
            },
            Role::Assistant => Self::Assistant {
                id,
                content: Some(content),
                name: None,
                tool_calls: None,
            },
            Role::User => Self::User {
                id,
                content,
                name: None,
            },
            Role::Tool => Self::Tool {
                id,
                content,
                tool_call_id: ToolCallId::random(),
                error: None,
            },
        }
    }

    /// Creates a tool result message bound to a tool call.
    pub fn tool_result(
        id: impl Into<MessageId>,
        tool_call_id: impl Into<ToolCallId>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            id: id.into(),
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            error: None,
        }
    }

    /// Creates a new user message with a random ID.
    pub fn new_user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageId::random(), content)
    }

    /// Creates a new assistant message with a random ID.
    pub fn new_assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageId::random(), content)
    }

    /// Returns a reference to the message ID.
    pub fn id(&self) -> &MessageId {
        match self {
            Message::Developer { id, .. }
            | Message::System { id, .. }
            | Message::Assistant { id, .. }
            | Message::User { id, .. }
            | Message::Tool { id, .. } => id,
        }
    }

    /// Returns the role of this message.
    pub fn role(&self) -> Role {
        match self {
            Message::Developer { .. } => Role::Developer,
            Message::System { .. } => Role::System,
            Message::Assistant { .. } => Role::Assistant,
            Message::User { .. } => Role::User,
            Message::Tool { .. } => Role::Tool,
        }
    }

    /// Returns the text content of this message, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::Developer { content, .. }
            | Message::System { content, .. }
            | Message::User { content, .. }
            | Message::Tool { content, .. } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Returns the tool calls attached to an assistant message.
    pub fn tool_calls(&self) -> Option<&[ToolCall]> {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls.as_deref(),
            _ => None,
        }
    }

    /// Attaches tool calls to an assistant message. Other roles are returned unchanged.
    pub fn with_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        match self {
            Message::Assistant {
                id, content, name, ..
            } => Message::Assistant {
                id,
                content,
                name,
                tool_calls: Some(calls),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        let parsed: Role = serde_json::from_str("\"developer\"").unwrap();
        assert_eq!(parsed, Role::Developer);
    }

    #[test]
    fn test_message_enum_serialization() {
        let msg = Message::new(Role::User, "u1", "Hello, world!");
        let json = serde_json::to_string(&msg).unwrap();

        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"id\":\"u1\""));
        assert!(json.contains("\"content\":\"Hello, world!\""));
    }

    #[test]
    fn test_assistant_without_content_decodes() {
        let msg: Message = serde_json::from_str(r#"{"role":"assistant","id":"a1"}"#).unwrap();
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.content(), None);
        assert!(msg.tool_calls().is_none());
    }

    #[test]
    fn test_tool_result_message() {
        let msg = Message::tool_result("t1", "call_1", "42");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"toolCallId\":\"call_1\""));
        assert_eq!(msg.content(), Some("42"));
    }

    #[test]
    fn test_with_tool_calls_only_touches_assistant() {
        let call = ToolCall::new(
            "call_1",
            FunctionCall {
                name: "search".into(),
                arguments: "{}".into(),
            },
        );
        let assistant = Message::new_assistant("").with_tool_calls(vec![call.clone()]);
        assert_eq!(assistant.tool_calls(), Some(&[call.clone()][..]));

        let user = Message::new_user("hi").with_tool_calls(vec![call]);
        assert!(user.tool_calls().is_none());
    }
}
