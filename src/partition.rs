//! Partitioner (spec.md §4.4), grounded on `tool_discovery.py`.

use std::collections::HashMap;

use crate::config::ChatConfig;
use crate::toolset::extract_server_and_tool;
use crate::model::Tool;

/// Partition a tool catalogue into tools to load immediately and tools to
/// defer per server.
///
/// - Discovery absent or disabled: everything loads.
/// - `defer_all`: everything defers, grouped by server.
/// - Otherwise: a tool defers iff its owning server has `defer_loading`
///   set; tools whose server can't be resolved load eagerly (fail safe).
pub fn partition_tools(
    tools: &[Tool],
    config: &ChatConfig,
    server_names: &std::collections::HashSet<String>,
) -> (Vec<Tool>, HashMap<String, Vec<Tool>>) {
    let Some(discovery) = config.tool_discovery.as_ref().filter(|d| d.enabled) else {
        return (tools.to_vec(), HashMap::new());
    };

    let mut loaded = Vec::new();
    let mut deferred_by_server: HashMap<String, Vec<Tool>> = HashMap::new();

    for tool in tools {
        let (server_name, _) = extract_server_and_tool(&tool.name, server_names);
        let should_defer = discovery.defer_all
            || config.servers.get(&server_name).is_some_and(|s| s.defer_loading());

        if should_defer {
            deferred_by_server.entry(server_name).or_default().push(tool.clone());
        } else {
            loaded.push(tool.clone());
        }
    }

    if !deferred_by_server.is_empty() {
        let total_deferred: usize = deferred_by_server.values().map(Vec::len).sum();
        tracing::info!(
            loaded = loaded.len(),
            deferred = total_deferred,
            servers = deferred_by_server.len(),
            "partitioned tools"
        );
    } else {
        tracing::debug!("no deferred tools - all tools loaded eagerly");
    }

    (loaded, deferred_by_server)
}

/// Map each tool name to its resolved server name.
pub fn build_tool_server_map(
    tools: &[Tool],
    server_names: &std::collections::HashSet<String>,
) -> HashMap<String, String> {
    tools
        .iter()
        .map(|tool| {
            let (server_name, _) = extract_server_and_tool(&tool.name, server_names);
            (tool.name.clone(), server_name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, ToolDiscoveryConfig};
    use serde_json::json;
    use std::collections::HashSet;

    fn tool(name: &str) -> Tool {
        Tool::new(name, None, json!({}))
    }

    fn stdio_server(defer: bool) -> ServerConfig {
        ServerConfig::Stdio {
            command: "echo".into(),
            args: vec![],
            env: Default::default(),
            cwd: None,
            defer_loading: defer,
        }
    }

    #[test]
    fn discovery_disabled_loads_everything() {
        let config = ChatConfig::default();
        let names: HashSet<String> = HashSet::new();
        let (loaded, deferred) = partition_tools(&[tool("a"), tool("b")], &config, &names);
        assert_eq!(loaded.len(), 2);
        assert!(deferred.is_empty());
    }

    #[test]
    fn defer_all_defers_every_tool_grouped_by_server() {
        let mut config = ChatConfig::default();
        config.servers.insert("weather".into(), stdio_server(false));
        config.tool_discovery =
            Some(ToolDiscoveryConfig { enabled: true, defer_all: true, max_search_results: 5 });
        let names: HashSet<String> = ["weather".to_string()].into();
        let (loaded, deferred) = partition_tools(&[tool("weather_forecast")], &config, &names);
        assert!(loaded.is_empty());
        assert_eq!(deferred["weather"].len(), 1);
    }

    #[test]
    fn per_server_defer_loading_flag_is_respected() {
        let mut config = ChatConfig::default();
        config.servers.insert("weather".into(), stdio_server(true));
        config.servers.insert("search".into(), stdio_server(false));
        config.tool_discovery =
            Some(ToolDiscoveryConfig { enabled: true, defer_all: false, max_search_results: 5 });
        let names: HashSet<String> = ["weather".to_string(), "search".to_string()].into();
        let (loaded, deferred) =
            partition_tools(&[tool("weather_forecast"), tool("search_web")], &config, &names);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "search_web");
        assert_eq!(deferred["weather"].len(), 1);
    }

    #[test]
    fn unknown_server_loads_eagerly() {
        let mut config = ChatConfig::default();
        config.tool_discovery =
            Some(ToolDiscoveryConfig { enabled: true, defer_all: false, max_search_results: 5 });
        let names: HashSet<String> = HashSet::new();
        let (loaded, deferred) = partition_tools(&[tool("mystery_tool")], &config, &names);
        assert_eq!(loaded.len(), 1);
        assert!(deferred.is_empty());
    }
}
