//! Configuration data model.
//!
//! This module defines only the *shape* of configuration (the JSON document
//! described in spec.md §6); loading it from disk, watching it for changes,
//! and resolving credentials are left to the embedding application, which
//! deserializes into these types with `serde_json::from_value`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Transport protocol for a `Remote` server. Auto-detected (left
/// unspecified) when absent, matching `RemoteServerConfig.transport:
/// Literal["streamable-http", "sse", "http"] | None` in the original.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteTransport {
    Http,
    StreamableHttp,
    Sse,
}

/// One MCP server entry: a stdio-spawned subprocess or a remote HTTP/SSE
/// endpoint. Distinguished by which required field is present (`command`
/// vs `url`) rather than a shared discriminator tag, since a remote
/// entry's own `transport` field names the wire protocol
/// (`http`/`streamable-http`/`sse`), not the server kind, and is optional.
/// Both variants carry `defer_loading`, which the partitioner
/// (`partition.rs`) uses to decide whether the server's tools are loaded
/// eagerly or left for on-demand discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ServerConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        defer_loading: bool,
    },
    Remote {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        transport: Option<RemoteTransport>,
        #[serde(default)]
        defer_loading: bool,
    },
}

impl ServerConfig {
    pub fn defer_loading(&self) -> bool {
        match self {
            Self::Stdio { defer_loading, .. } | Self::Remote { defer_loading, .. } => {
                *defer_loading
            }
        }
    }
}

/// A client connection to an LLM API provider. The LLM adapter collaborator
/// is the thing that actually dials out; this struct is just the config
/// that gets handed to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

fn default_timeout() -> f64 {
    60.0
}

/// A named model: which client it talks through, which model id to request,
/// and any prompt-template/temperature override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub client: String,
    pub model: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Per-server inclusion rule inside a named toolset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolSpec {
    /// `true` — include every tool from this server.
    All(bool),
    /// An explicit allow-list of base tool names.
    Include(Vec<String>),
    /// `{"exclude": [...]}` — include everything except these names.
    Exclude { exclude: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolsetConfig {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub servers: HashMap<String, ToolSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDiscoveryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub defer_all: bool,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

impl Default for ToolDiscoveryConfig {
    fn default() -> Self {
        Self { enabled: false, defer_all: false, max_search_results: default_max_search_results() }
    }
}

fn default_max_search_results() -> usize {
    5
}

/// Top-level configuration document (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatConfig {
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,
    pub models: HashMap<String, ModelConfig>,
    pub servers: HashMap<String, ServerConfig>,
    #[serde(default)]
    pub tool_sets: HashMap<String, ToolsetConfig>,
    #[serde(default)]
    pub tool_discovery: Option<ToolDiscoveryConfig>,
}

impl ChatConfig {
    pub fn server_names(&self) -> std::collections::HashSet<String> {
        self.servers.keys().cloned().collect()
    }

    /// Whether tool discovery is active for this config — collapses the
    /// `None` / `Some(disabled)` redundancy noted in DESIGN.md.
    pub fn discovery_enabled(&self) -> bool {
        self.tool_discovery.as_ref().is_some_and(|d| d.enabled)
    }
}

/// Parse a JSON MCP tool env var like `MCP_TOOL_CACHE_TTL`. A non-positive
/// value means "never expires"; an unparsable value falls back to the
/// supplied default rather than erroring, matching the original's
/// forgiving behaviour for a misconfigured env var.
pub fn parse_ttl_env(value: Option<&str>, default_seconds: f64) -> Option<f64> {
    let Some(value) = value else {
        return Some(default_seconds);
    };
    let ttl: f64 = match value.parse() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(
                "Invalid cache TTL value '{value}'. Falling back to default of {default_seconds}s."
            );
            return Some(default_seconds);
        }
    };
    if ttl <= 0.0 {
        None
    } else {
        Some(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_server_parses_from_json() {
        let json = serde_json::json!({
            "transport": "stdio",
            "command": "python",
            "args": ["-m", "server"],
            "defer_loading": true,
        });
        let server: ServerConfig = serde_json::from_value(json).unwrap();
        assert!(server.defer_loading());
    }

    #[test]
    fn remote_server_defaults_defer_loading_false() {
        let json = serde_json::json!({"transport": "sse", "url": "https://x"});
        let server: ServerConfig = serde_json::from_value(json).unwrap();
        assert!(!server.defer_loading());
        match server {
            ServerConfig::Remote { transport, .. } => {
                assert_eq!(transport, Some(RemoteTransport::Sse));
            }
            ServerConfig::Stdio { .. } => panic!("expected Remote"),
        }
    }

    #[test]
    fn remote_server_transport_is_optional() {
        let json = serde_json::json!({"url": "https://x"});
        let server: ServerConfig = serde_json::from_value(json).unwrap();
        match server {
            ServerConfig::Remote { transport, .. } => assert_eq!(transport, None),
            ServerConfig::Stdio { .. } => panic!("expected Remote"),
        }
    }

    #[test]
    fn ttl_env_non_positive_means_never_expires() {
        assert_eq!(parse_ttl_env(Some("0"), 30.0), None);
        assert_eq!(parse_ttl_env(Some("-5"), 30.0), None);
        assert_eq!(parse_ttl_env(Some("10"), 30.0), Some(10.0));
        assert_eq!(parse_ttl_env(None, 30.0), Some(30.0));
        assert_eq!(parse_ttl_env(Some("garbage"), 30.0), Some(30.0));
    }

    #[test]
    fn discovery_enabled_collapses_none_and_disabled() {
        let mut cfg = ChatConfig::default();
        assert!(!cfg.discovery_enabled());
        cfg.tool_discovery = Some(ToolDiscoveryConfig { enabled: false, ..Default::default() });
        assert!(!cfg.discovery_enabled());
        cfg.tool_discovery = Some(ToolDiscoveryConfig { enabled: true, ..Default::default() });
        assert!(cfg.discovery_enabled());
    }
}
