//! Usage statistics accumulated over the course of a single `chat()` call.
//!
//! A fresh `ChatStats` is allocated at the start of every call (see
//! `orchestrator.rs`) and is never shared or aliased across concurrent
//! calls; only the *publication slot* (`ChatOrchestrator::last_stats`) is
//! shared, and that is documented as last-writer-wins.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsageStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsageStats {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn add(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolUsageStats {
    pub by_tool: HashMap<String, u64>,
    pub by_server: HashMap<String, u64>,
}

impl ToolUsageStats {
    pub fn total_tool_calls(&self) -> u64 {
        self.by_tool.values().sum()
    }

    pub fn record(&mut self, tool_name: &str, server_name: &str) {
        *self.by_tool.entry(tool_name.to_string()).or_insert(0) += 1;
        *self.by_server.entry(server_name.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub search_calls: u64,
    pub tools_discovered: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatStats {
    pub llm_calls: u64,
    pub tokens: TokenUsageStats,
    pub tool_calls: ToolUsageStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryStats>,
}

impl ChatStats {
    /// A fresh, zeroed stats block. Called once per `chat()` invocation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tool_call(&mut self, tool_name: &str, server_name: &str) {
        self.tool_calls.record(tool_name, server_name);
    }

    pub fn record_llm_call(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.llm_calls += 1;
        self.tokens.add(prompt_tokens, completion_tokens);
    }

    pub fn record_search(&mut self, newly_discovered: u64) {
        let discovery = self.discovery.get_or_insert_with(DiscoveryStats::default);
        discovery.search_calls += 1;
        discovery.tools_discovered += newly_discovered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_tool_calls_equals_sum_of_by_tool() {
        let mut stats = ChatStats::new();
        stats.record_tool_call("search", "web");
        stats.record_tool_call("search", "web");
        stats.record_tool_call("fetch", "web");
        assert_eq!(stats.tool_calls.total_tool_calls(), 3);
        assert_eq!(stats.tool_calls.by_tool["search"], 2);
        assert_eq!(stats.tool_calls.by_server["web"], 3);
    }

    #[test]
    fn discovery_is_none_until_first_search() {
        let mut stats = ChatStats::new();
        assert!(stats.discovery.is_none());
        stats.record_search(2);
        assert_eq!(stats.discovery.unwrap().tools_discovered, 2);
    }
}
