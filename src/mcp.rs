//! The MCP transport contract plus the result-normalization logic that sits
//! in front of it (spec.md §4.6.3).
//!
//! Wire-level MCP (stdio/HTTP/SSE framing, JSON-RPC handshake, `rmcp`
//! session lifecycle) is an external collaborator's job — this crate only
//! defines the trait boundary plus a default implementation backed by
//! `rmcp`, shaped after the teacher's `McpProxyTool`
//! (`agent/tools/mcp/proxy.rs`), which is the only place in the teacher
//! that actually talks to an MCP peer.

use std::borrow::Cow;
use std::fmt::Write as _;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, RawContent};
use rmcp::service::Peer;
use rmcp::RoleClient;
use serde_json::{Map, Value};

use crate::model::Tool;

/// A single content block returned by a tool call, already stripped of MCP
/// wire-format wrapping.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    /// Non-text content (image, audio, ...) with a known MIME type.
    Other { kind: String, mime_type: String },
    /// Anything else — rendered as a JSON string in the final output.
    Unknown(String),
}

#[derive(Debug, Clone, Default)]
pub struct CallToolOutcome {
    pub content: Vec<ContentBlock>,
    /// Machine-readable result, preferred over `content` when present.
    pub structured_content: Option<Value>,
    pub is_error: bool,
}

/// Mirrors the original's exception split in `McpToolChat.execute`: a
/// `ValueError`-shaped failure (bad arguments, unknown tool) surfaces its
/// message straight to the LLM as tool content; anything else gets a
/// generic message so internal failure detail doesn't leak into the
/// conversation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum McpCallError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn list_tools(&self) -> anyhow::Result<Vec<Tool>>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
        meta: Option<Value>,
    ) -> Result<CallToolOutcome, McpCallError>;
}

/// `rmcp`-backed transport talking to a single MCP server peer.
pub struct RmcpTransport {
    peer: Peer<RoleClient>,
}

impl RmcpTransport {
    pub fn new(peer: Peer<RoleClient>) -> Self {
        Self { peer }
    }
}

#[async_trait]
impl McpTransport for RmcpTransport {
    async fn list_tools(&self) -> anyhow::Result<Vec<Tool>> {
        let result = self
            .peer
            .list_tools(None)
            .await
            .map_err(|e| anyhow::anyhow!("list_tools failed: {e}"))?;

        Ok(result
            .tools
            .into_iter()
            .map(|t| {
                Tool::new(
                    t.name.to_string(),
                    t.description.map(|d| d.to_string()),
                    Value::Object((*t.input_schema).clone()),
                )
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
        _meta: Option<Value>,
    ) -> Result<CallToolOutcome, McpCallError> {
        let request = CallToolRequestParams {
            meta: None,
            name: Cow::Owned(name.to_string()),
            arguments,
            task: None,
        };

        let result = self
            .peer
            .call_tool(request)
            .await
            .map_err(|e| McpCallError::Failed(format!("MCP tool '{name}' call failed: {e}")))?;

        let is_error = result.is_error.unwrap_or(false);
        let content = result
            .content
            .iter()
            .map(|annotated| match &annotated.raw {
                RawContent::Text(text) => ContentBlock::Text(text.text.clone()),
                RawContent::Image(img) => {
                    ContentBlock::Other { kind: "image".into(), mime_type: img.mime_type.clone() }
                }
                RawContent::Audio(audio) => {
                    ContentBlock::Other { kind: "audio".into(), mime_type: audio.mime_type.clone() }
                }
                other => ContentBlock::Unknown(format!("{other:?}")),
            })
            .collect();

        Ok(CallToolOutcome { content, structured_content: None, is_error })
    }
}

/// Normalize a tool call outcome into the text handed back to the LLM,
/// following spec.md §4.6.3's precedence exactly:
///
/// 1. `structured_content`, JSON-encoded, if present.
/// 2. `"[No content returned]"` if there is no content at all.
/// 3. Otherwise walk each content item: text items are optimistically
///    JSON-parsed (falling back to the raw string on failure); non-text
///    items with a known MIME type become `"[<type>: <mime>]"`; anything
///    else is stringified. The resulting parts are JSON-array-encoded.
pub fn normalize_result(outcome: &CallToolOutcome) -> String {
    if let Some(structured) = &outcome.structured_content {
        return serde_json::to_string(structured)
            .unwrap_or_else(|_| structured.to_string());
    }

    if outcome.content.is_empty() {
        return "[No content returned]".to_string();
    }

    let parts: Vec<Value> = outcome
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => {
                serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.clone()))
            }
            ContentBlock::Other { kind, mime_type } => {
                let mut s = String::new();
                let _ = write!(s, "[{kind}: {mime_type}]");
                Value::String(s)
            }
            ContentBlock::Unknown(raw) => Value::String(raw.clone()),
        })
        .collect();

    serde_json::to_string(&parts).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_content_wins_over_content_blocks() {
        let outcome = CallToolOutcome {
            content: vec![ContentBlock::Text("ignored".into())],
            structured_content: Some(serde_json::json!({"ok": true})),
            is_error: false,
        };
        assert_eq!(normalize_result(&outcome), r#"{"ok":true}"#);
    }

    #[test]
    fn empty_content_becomes_placeholder() {
        let outcome = CallToolOutcome::default();
        assert_eq!(normalize_result(&outcome), "[No content returned]");
    }

    #[test]
    fn text_item_is_json_parsed_when_possible() {
        let outcome = CallToolOutcome {
            content: vec![ContentBlock::Text(r#"{"temp": 72}"#.into())],
            ..Default::default()
        };
        assert_eq!(normalize_result(&outcome), r#"[{"temp":72}]"#);
    }

    #[test]
    fn text_item_falls_back_to_raw_string_on_parse_failure() {
        let outcome = CallToolOutcome {
            content: vec![ContentBlock::Text("just plain text".into())],
            ..Default::default()
        };
        assert_eq!(normalize_result(&outcome), r#"["just plain text"]"#);
    }

    #[test]
    fn image_content_renders_as_mime_tag() {
        let outcome = CallToolOutcome {
            content: vec![ContentBlock::Other { kind: "image".into(), mime_type: "image/png".into() }],
            ..Default::default()
        };
        assert_eq!(normalize_result(&outcome), r#"["[image: image/png]"]"#);
    }
}
