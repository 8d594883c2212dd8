//! Chat Orchestrator (spec.md §4.6): drives the LLM/tool-call loop.
//!
//! Grounded on the teacher's `agent/loop/mod.rs` for the overall
//! iteration/stats/dispatch shape (config struct, iterate-until-no-tool-
//! calls, per-turn concurrent tool fan-out) and on `mcp_tool_chat.py`'s
//! `chat`/`execute`/`generate` for the exact per-call control flow this
//! crate narrows down to (no sessions, no channels — just one `chat` call
//! in, one message list out).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{ChatConfig, ToolsetConfig};
use crate::errors::ChatError;
use crate::llm::{ChatRequest as LlmChatRequest, LlmAdapter, ModelFactory, ModelRef, ToolDefinition};
use crate::mcp::{normalize_result, McpCallError, McpTransport};
use crate::model::{ChatMessage, Tool, ToolCall};
use crate::partition::{build_tool_server_map, partition_tools};
use crate::result_style::{format_tool_result, ResultStyle};
use crate::search_tools::{SearchToolsArgs, SearchToolsTool, SyntheticToolResult, SEARCH_TOOLS_NAME};
use crate::stats::ChatStats;
use crate::tool_cache::ToolCache;
use crate::toolset::filter_tools_by_toolset;

/// Sentinel server name tool calls to synthetic tools are billed against.
pub const SYNTHETIC_SERVER: &str = "_synthetic";

/// Default hard cap on chat-loop iterations; overridable via
/// `MCP_MAX_CHAT_ITERATIONS`.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

fn max_iterations_from_env() -> usize {
    std::env::var("MCP_MAX_CHAT_ITERATIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_ITERATIONS)
}

fn tool_to_definition(tool: &Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone().unwrap_or_default(),
        parameters: tool.input_schema.clone(),
    }
}

/// Per-call discovery state: the loaded/deferred partition and the
/// search-tools instance (if anything is deferred). Allocated fresh per
/// `chat()` call — never shared with another concurrent call.
struct DiscoveryState {
    loaded_names: HashSet<String>,
    deferred_by_server: HashMap<String, Vec<Tool>>,
    search_tool: Option<Mutex<SearchToolsTool>>,
}

impl DiscoveryState {
    fn build(catalogue: &[Tool], config: &ChatConfig, server_names: &HashSet<String>) -> Self {
        let (loaded, deferred_by_server) = partition_tools(catalogue, config, server_names);
        let loaded_names: HashSet<String> = loaded.iter().map(|t| t.name.clone()).collect();

        let search_tool = if deferred_by_server.is_empty() {
            None
        } else {
            let discovery_cfg = config.tool_discovery.clone().unwrap_or_default();
            let all_servers: Vec<String> = server_names.iter().cloned().collect();
            Some(Mutex::new(SearchToolsTool::new(
                deferred_by_server.clone(),
                all_servers,
                discovery_cfg,
            )))
        };

        Self { loaded_names, deferred_by_server, search_tool }
    }
}

/// Configuration for constructing a `ChatOrchestrator`.
pub struct ChatOrchestratorConfig {
    pub transport: Arc<dyn McpTransport>,
    pub config: ChatConfig,
    pub cache_ttl: Option<std::time::Duration>,
    pub default_system: Option<String>,
    pub model_factory: Option<Arc<dyn ModelFactory>>,
}

pub struct ChatOrchestrator {
    tool_cache: ToolCache,
    config: ChatConfig,
    server_names: HashSet<String>,
    default_system: Option<String>,
    model_factory: Option<Arc<dyn ModelFactory>>,
    max_iterations: usize,
    result_style: ResultStyle,
    last_stats: Mutex<Option<ChatStats>>,
}

impl ChatOrchestrator {
    pub fn new(cfg: ChatOrchestratorConfig) -> Self {
        let server_names = cfg.config.server_names();
        Self {
            tool_cache: ToolCache::new(cfg.transport, cfg.cache_ttl),
            config: cfg.config,
            server_names,
            default_system: cfg.default_system,
            model_factory: cfg.model_factory,
            max_iterations: max_iterations_from_env(),
            result_style: ResultStyle::from_env(),
            last_stats: Mutex::new(None),
        }
    }

    /// Stats from whichever call most recently completed. Last-writer-wins
    /// across concurrent calls — see DESIGN.md. The return value of
    /// `chat`/`generate` is the authoritative per-call stats.
    pub async fn last_stats(&self) -> Option<ChatStats> {
        self.last_stats.lock().await.clone()
    }

    /// Wrap a single user prompt into a one-message conversation and run
    /// `chat`. See SPEC_FULL.md §B.1.
    pub async fn generate(
        &self,
        prompt: impl Into<String>,
        model: ModelRef,
        system: Option<String>,
        tool_set: Option<&ToolsetConfig>,
        meta: Option<Value>,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let messages = vec![ChatMessage::user(prompt)];
        self.chat(&messages, model, system, tool_set, meta).await
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        model: ModelRef,
        system: Option<String>,
        tool_set: Option<&ToolsetConfig>,
        meta: Option<Value>,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let adapter = model.resolve(self.model_factory.as_deref())?;
        let resolved_system = system.or_else(|| self.default_system.clone());

        let all_tools = self
            .tool_cache
            .get_tools(false)
            .await
            .map_err(|e| ChatError::Transport { message: e.to_string(), retryable: true })?;
        let mut catalogue = match tool_set {
            Some(toolset) => filter_tools_by_toolset(&all_tools, toolset, &self.server_names, true)?,
            None => all_tools,
        };
        let mut watch_version = self.tool_cache.version();

        let mut stats = ChatStats::new();
        if self.config.discovery_enabled() {
            stats.discovery = Some(Default::default());
        }

        let mut discovery = DiscoveryState::build(&catalogue, &self.config, &self.server_names);
        let mut tool_server_map = build_tool_server_map(&catalogue, &self.server_names);

        let mut working_messages: Vec<ChatMessage> = messages.to_vec();
        let has_system = working_messages.iter().any(ChatMessage::is_system);
        if !has_system {
            if let Some(system_content) = &resolved_system {
                working_messages.insert(0, ChatMessage::system(system_content.clone()));
            }
        }

        let system_count = working_messages.iter().take_while(|m| m.is_system()).count();
        let mut discovery_message_index: Option<usize> = None;
        if let Some(search_tool) = &discovery.search_tool {
            let prompt = search_tool.lock().await.system_prompt();
            working_messages.insert(system_count, ChatMessage::system(prompt));
            discovery_message_index = Some(system_count);
        }

        let mut response_accumulator: Vec<ChatMessage> = Vec::new();

        for _iteration in 0..self.max_iterations {
            if self.config.discovery_enabled() {
                let current_version = self.tool_cache.version();
                if current_version != watch_version {
                    watch_version = current_version;
                    let refreshed = self
                        .tool_cache
                        .get_tools(false)
                        .await
                        .map_err(|e| ChatError::Transport { message: e.to_string(), retryable: true })?;
                    let refreshed = match tool_set {
                        Some(toolset) => {
                            filter_tools_by_toolset(&refreshed, toolset, &self.server_names, true)?
                        }
                        None => refreshed,
                    };

                    let mut rebuilt = DiscoveryState::build(&refreshed, &self.config, &self.server_names);
                    // Tools already loaded in this call stay loaded even if
                    // the fresh partition would newly defer them.
                    rebuilt.loaded_names.extend(discovery.loaded_names.iter().cloned());
                    for tools in rebuilt.deferred_by_server.values_mut() {
                        tools.retain(|t| !rebuilt.loaded_names.contains(&t.name));
                    }
                    rebuilt.deferred_by_server.retain(|_, tools| !tools.is_empty());
                    if let Some(search_tool) = &rebuilt.search_tool {
                        let discovery_cfg = self.config.tool_discovery.clone().unwrap_or_default();
                        let all_servers: Vec<String> = self.server_names.iter().cloned().collect();
                        *search_tool.lock().await = SearchToolsTool::new(
                            rebuilt.deferred_by_server.clone(),
                            all_servers,
                            discovery_cfg,
                        );
                    }

                    if let Some(idx) = discovery_message_index.take() {
                        working_messages.remove(idx);
                    }
                    if let Some(search_tool) = &rebuilt.search_tool {
                        let prompt = search_tool.lock().await.system_prompt();
                        let insert_at = working_messages.iter().take_while(|m| m.is_system()).count();
                        working_messages.insert(insert_at, ChatMessage::system(prompt));
                        discovery_message_index = Some(insert_at);
                    }

                    catalogue = refreshed;
                    tool_server_map = build_tool_server_map(&catalogue, &self.server_names);
                    discovery = rebuilt;

                    tracing::info!("tool cache changed mid-call, rebuilt discovery state");
                }
            }

            let mut tool_defs: Vec<ToolDefinition> = catalogue
                .iter()
                .filter(|t| discovery.loaded_names.contains(&t.name))
                .map(tool_to_definition)
                .collect();
            if let Some(search_tool) = &discovery.search_tool {
                tool_defs.push(tool_to_definition(&search_tool.lock().await.definition()));
            }

            let llm_response = adapter
                .chat_with_retry(
                    LlmChatRequest { messages: &working_messages, tools: &tool_defs, temperature: None },
                    None,
                )
                .await?;

            stats.record_llm_call(llm_response.usage.prompt_tokens, llm_response.usage.completion_tokens);

            let assistant_message = llm_response.clone().into_message();
            response_accumulator.push(assistant_message.clone());
            working_messages.push(assistant_message);

            let tool_calls = llm_response.tool_calls;
            if tool_calls.is_empty() {
                self.publish_stats(stats).await;
                return Ok(response_accumulator);
            }

            let futures = tool_calls
                .iter()
                .map(|call| self.dispatch_tool_call(call, &discovery, &tool_server_map, meta.clone()));
            let results = join_all(futures).await;

            for (call, (message, server_name, newly_loaded, search_hit)) in
                tool_calls.iter().zip(results)
            {
                stats.record_tool_call(&call.function.name, &server_name);
                if search_hit {
                    stats.record_search(newly_loaded.len() as u64);
                }
                for tool in newly_loaded {
                    discovery.loaded_names.insert(tool.name.clone());
                    let owning_server =
                        tool_server_map.get(&tool.name).cloned().unwrap_or_else(|| server_name.clone());
                    if let Some(list) = discovery.deferred_by_server.get_mut(&owning_server) {
                        list.retain(|t| t.name != tool.name);
                    }
                }
                response_accumulator.push(message.clone());
                working_messages.push(message);
            }
        }

        // Loop-limit exhaustion is fatal for this call; stats are not
        // published, mirroring cancellation.
        Err(ChatError::LoopLimitExceeded(self.max_iterations))
    }

    async fn publish_stats(&self, stats: ChatStats) {
        *self.last_stats.lock().await = Some(stats);
    }

    /// Dispatch a single tool call: synthetic tools run in-process, MCP
    /// tools go through the transport, and calls to a deferred tool are
    /// rejected locally with guidance instead of reaching MCP.
    async fn dispatch_tool_call(
        &self,
        call: &ToolCall,
        discovery: &DiscoveryState,
        tool_server_map: &HashMap<String, String>,
        meta: Option<Value>,
    ) -> (ChatMessage, String, Vec<Tool>, bool) {
        let tool_name = call.function.name.as_str();
        let server_name = tool_server_map.get(tool_name).cloned().unwrap_or_else(|| "default".into());

        if tool_name == SEARCH_TOOLS_NAME {
            if let Some(search_tool) = &discovery.search_tool {
                let args = serde_json::from_str::<Value>(&call.function.arguments)
                    .unwrap_or(Value::Object(Default::default()));
                let SyntheticToolResult { content, newly_loaded_tools } =
                    search_tool.lock().await.execute(SearchToolsArgs::from_json(&args));
                let message = ChatMessage::tool_result(tool_name, call.id.clone(), content);
                return (message, SYNTHETIC_SERVER.to_string(), newly_loaded_tools, true);
            }
        }

        let is_deferred = discovery
            .deferred_by_server
            .get(&server_name)
            .is_some_and(|tools| tools.iter().any(|t| t.name == tool_name));
        if is_deferred {
            let content = format!(
                "Error: Tool '{tool_name}' is not yet loaded. Use '{SEARCH_TOOLS_NAME}' to discover and load it first."
            );
            let message = ChatMessage::tool_result(tool_name, call.id.clone(), content);
            return (message, server_name, vec![], false);
        }

        let args: Value = match serde_json::from_str(&call.function.arguments) {
            Ok(v) => v,
            Err(_) => {
                let content = format!("Error: Malformed arguments for tool '{tool_name}'.");
                let message = ChatMessage::tool_result(tool_name, call.id.clone(), content);
                return (message, server_name, vec![], false);
            }
        };
        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("input".to_string(), other);
                Some(map)
            }
        };

        let outcome = self.tool_cache.transport().call_tool(tool_name, arguments, meta).await;
        let content = match outcome {
            Ok(result) => {
                let raw = normalize_result(&result);
                format_tool_result(call, &raw, self.result_style)
            }
            Err(McpCallError::Invalid(message)) => message,
            Err(McpCallError::Failed(_)) => {
                format!("Error: Tool '{tool_name}' failed to execute.")
            }
        };
        let message = ChatMessage::tool_result(tool_name, call.id.clone(), content);
        (message, server_name, vec![], false)
    }
}
