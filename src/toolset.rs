//! Toolset Filter (spec.md §4.2), grounded directly on `tool_filter.py`.

use std::collections::{HashMap, HashSet};

use crate::config::{ToolSpec, ToolsetConfig};
use crate::errors::ChatError;
use crate::model::Tool;

/// Splits a (possibly server-prefixed) tool name into `(server, base_name)`.
///
/// When multiple servers are configured, tools are prefixed
/// `"<server>_<tool>"`; with exactly one configured server names are left
/// bare and attributed to that server; otherwise the server can't be
/// determined and falls back to `"default"`.
pub fn extract_server_and_tool(tool_name: &str, server_names: &HashSet<String>) -> (String, String) {
    if let Some(idx) = tool_name.find('_') {
        let prefix = &tool_name[..idx];
        if server_names.contains(prefix) {
            return (prefix.to_string(), tool_name[idx + 1..].to_string());
        }
    }

    if server_names.len() == 1 {
        let only = server_names.iter().next().unwrap().clone();
        return (only, tool_name.to_string());
    }

    ("default".to_string(), tool_name.to_string())
}

fn build_server_tool_map(
    tools: &[Tool],
    server_names: &HashSet<String>,
) -> HashMap<String, HashSet<String>> {
    let mut map: HashMap<String, HashSet<String>> =
        server_names.iter().map(|s| (s.clone(), HashSet::new())).collect();

    for tool in tools {
        let (server, base) = extract_server_and_tool(&tool.name, server_names);
        if let Some(set) = map.get_mut(&server) {
            set.insert(base);
        }
    }

    map
}

/// Validate that a toolset only references known servers and tools,
/// collecting *every* problem rather than failing on the first one.
pub fn validate_toolset(
    toolset: &ToolsetConfig,
    tools: &[Tool],
    server_names: &HashSet<String>,
) -> Result<(), ChatError> {
    let server_tool_map = build_server_tool_map(tools, server_names);
    let mut errors = Vec::new();

    for (server_name, tool_spec) in &toolset.servers {
        if !server_names.contains(server_name) {
            errors.push(format!("Server '{server_name}' not found in configuration"));
            continue;
        }

        let available = server_tool_map.get(server_name).cloned().unwrap_or_default();

        let names_to_check: &[String] = match tool_spec {
            ToolSpec::Include(names) => names,
            ToolSpec::Exclude { exclude } => exclude,
            ToolSpec::All(_) => &[],
        };
        let label = if matches!(tool_spec, ToolSpec::Exclude { .. }) {
            " (specified in exclude list)"
        } else {
            ""
        };

        for tool_name in names_to_check {
            if !available.contains(tool_name) {
                let mut sorted: Vec<&String> = available.iter().collect();
                sorted.sort();
                let available_list =
                    sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
                errors.push(format!(
                    "Tool '{tool_name}' not found in server '{server_name}'{label}. Available: [{available_list}]"
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ChatError::ToolsetValidation(errors))
    }
}

/// Filter a tool catalogue down to what a toolset allows.
pub fn filter_tools_by_toolset(
    tools: &[Tool],
    toolset: &ToolsetConfig,
    server_names: &HashSet<String>,
    validate: bool,
) -> Result<Vec<Tool>, ChatError> {
    if validate {
        validate_toolset(toolset, tools, server_names)?;
    }

    let filtered: Vec<Tool> = tools
        .iter()
        .filter(|tool| {
            let (server, base) = extract_server_and_tool(&tool.name, server_names);
            match toolset.servers.get(&server) {
                None => false,
                Some(ToolSpec::All(include_all)) => *include_all,
                Some(ToolSpec::Include(names)) => names.contains(&base),
                Some(ToolSpec::Exclude { exclude }) => !exclude.contains(&base),
            }
        })
        .cloned()
        .collect();

    tracing::debug!(
        total = tools.len(),
        kept = filtered.len(),
        servers = toolset.servers.len(),
        "filtered tools by toolset"
    );

    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> Tool {
        Tool::new(name, None, json!({}))
    }

    fn servers(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_prefixed_tool_with_multiple_servers() {
        let names = servers(&["search", "fetch"]);
        assert_eq!(
            extract_server_and_tool("search_web_search", &names),
            ("search".to_string(), "web_search".to_string())
        );
    }

    #[test]
    fn single_server_leaves_tool_unprefixed() {
        let names = servers(&["fetch"]);
        assert_eq!(
            extract_server_and_tool("get_url", &names),
            ("fetch".to_string(), "get_url".to_string())
        );
    }

    #[test]
    fn unresolvable_falls_back_to_default() {
        let names = servers(&["a", "b"]);
        assert_eq!(
            extract_server_and_tool("lonely", &names),
            ("default".to_string(), "lonely".to_string())
        );
    }

    #[test]
    fn validate_collects_all_errors_not_just_the_first() {
        let mut toolset = ToolsetConfig::default();
        toolset.servers.insert("ghost".into(), ToolSpec::All(true));
        toolset.servers.insert("search".into(), ToolSpec::Include(vec!["missing".into()]));

        let names = servers(&["search"]);
        let tools = vec![tool("search_web_search")];

        let err = validate_toolset(&toolset, &tools, &names).unwrap_err();
        match err {
            ChatError::ToolsetValidation(errs) => {
                assert_eq!(errs.len(), 2);
                assert!(errs[0].contains("ghost"));
                assert!(errs[1].contains("missing"));
            }
            _ => panic!("expected ToolsetValidation"),
        }
    }

    #[test]
    fn filter_keeps_all_for_all_spec() {
        let mut toolset = ToolsetConfig::default();
        toolset.servers.insert("search".into(), ToolSpec::All(true));
        let names = servers(&["search"]);
        let tools = vec![tool("search_a"), tool("search_b")];
        let filtered = filter_tools_by_toolset(&tools, &toolset, &names, true).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn filter_excludes_named_tools() {
        let mut toolset = ToolsetConfig::default();
        toolset.servers.insert("search".into(), ToolSpec::Exclude { exclude: vec!["a".into()] });
        let names = servers(&["search"]);
        let tools = vec![tool("search_a"), tool("search_b")];
        let filtered = filter_tools_by_toolset(&tools, &toolset, &names, true).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "search_b");
    }
}
