//! The LLM adapter contract.
//!
//! This crate does not implement an LLM protocol (no OpenAI/Anthropic/Ollama
//! wire format, no streaming, no token counting heuristics) — that is an
//! external collaborator's job. What lives here is the trait boundary the
//! orchestrator calls through, shaped after the teacher's `LLMProvider`
//! (`providers/base/mod.rs`): one required `chat` method, a couple of
//! no-op-by-default hooks, and a retry helper built on the same
//! exponential-backoff-with-jitter shape the teacher uses for its HTTP
//! providers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ChatError;
use crate::model::{ChatMessage, ToolCall};

/// A tool definition as sent to the LLM (name/description/JSON Schema),
/// converted from the catalogue's `Tool` by the orchestrator.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Token usage reported by a single LLM call. Missing fields default to 0
/// per spec.md §4.6 step 6.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant(self.content, self.tool_calls)
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolDefinition],
    pub temperature: Option<f64>,
}

/// Configuration for `chat_with_retry`'s exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_delay_ms: 1000, max_delay_ms: 10_000, backoff_multiplier: 2.0 }
    }
}

/// The boundary between the orchestrator and a concrete LLM client.
///
/// Implementations live outside this crate (an OpenAI client, an Ollama
/// client, a test double); the orchestrator only ever depends on this
/// trait.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn chat(&self, req: ChatRequest<'_>) -> Result<LlmResponse, ChatError>;

    /// The model id this adapter defaults to when none is set explicitly.
    fn default_model(&self) -> &str;

    async fn chat_with_retry(
        &self,
        req: ChatRequest<'_>,
        retry_config: Option<RetryConfig>,
    ) -> Result<LlmResponse, ChatError> {
        let config = retry_config.unwrap_or_default();
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    max_retries = config.max_retries,
                    "retrying LLM call after error"
                );
            }
            let attempt_req = ChatRequest {
                messages: req.messages,
                tools: req.tools,
                temperature: req.temperature,
            };
            match self.chat(attempt_req).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < config.max_retries => {
                    let base = (config.initial_delay_ms as f64
                        * config.backoff_multiplier.powi(attempt as i32))
                    .min(config.max_delay_ms as f64) as u64;
                    let jitter = (base as f64 * 0.25 * fastrand::f64()) as u64;
                    tokio::time::sleep(tokio::time::Duration::from_millis(base + jitter)).await;
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(ChatError::ModelUnresolved("retry loop exhausted".into())))
    }
}

/// Resolves a named model to a concrete adapter. Mirrors the original's
/// `model_factory` — constructing the actual client (reading config,
/// picking a provider) is the embedding application's job.
pub trait ModelFactory: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn LlmAdapter>>;
}

/// A model reference passed to `chat()`/`generate()`: either an already
/// resolved adapter instance, or a name to resolve through a `ModelFactory`.
pub enum ModelRef {
    Instance(Arc<dyn LlmAdapter>),
    Name(String),
}

impl ModelRef {
    pub fn resolve(
        self,
        factory: Option<&dyn ModelFactory>,
    ) -> Result<Arc<dyn LlmAdapter>, ChatError> {
        match self {
            ModelRef::Instance(adapter) => Ok(adapter),
            ModelRef::Name(name) => factory
                .and_then(|f| f.resolve(&name))
                .ok_or(ChatError::ModelUnresolved(name)),
        }
    }
}
