//! Core data types shared across the chat orchestrator: the tool catalogue,
//! the conversation message model, and the wire shape of a tool call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool available to the LLM, as published by an MCP server (or a
/// synthetic tool built in-process).
///
/// `name` is unique across the whole catalogue for a given chat call: when
/// more than one server is configured, names are prefixed `<server>_<tool>`;
/// with a single server they are left bare.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: Option<String>, input_schema: Value) -> Self {
        Self { name: name.into(), description, input_schema }
    }
}

/// The function payload of a tool call emitted by the LLM: a name plus its
/// arguments serialized as a JSON string (not a parsed object — the LLM
/// adapter collaborator hands these back verbatim, and parsing is deferred
/// to dispatch time so malformed JSON becomes an in-band tool error rather
/// than a hard failure).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub function: ToolCallFunction,
}

/// A single message in a conversation.
///
/// `ToolResult.tool_call_id` must match the `id` of the `ToolCall` it
/// answers; results are appended to the conversation in call-emission
/// order, never completion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    #[serde(rename = "tool")]
    ToolResult {
        name: String,
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant { content, tool_calls }
    }

    pub fn tool_result(
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            name: name.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_with_no_tool_calls_has_empty_slice() {
        let msg = ChatMessage::assistant(Some("hi".into()), vec![]);
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("search_web", "call-1", "ok");
        match msg {
            ChatMessage::ToolResult { tool_call_id, .. } => assert_eq!(tool_call_id, "call-1"),
            _ => panic!("expected ToolResult"),
        }
    }
}
