//! Search-Tools synthetic tool (spec.md §4.5), grounded on
//! `search_tools_tool.py` and `synthetic_tool.py`.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::config::ToolDiscoveryConfig;
use crate::model::Tool;
use crate::search_index::ToolSearchIndex;

pub const SEARCH_TOOLS_NAME: &str = "search-tools";

const MAX_TOOL_NAMES_SHOWN: usize = 4;
const MAX_DESCRIPTION_LENGTH: usize = 80;

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    if let Some(pos) = text.find(". ") {
        return text[..=pos].to_string();
    }
    if text.ends_with('.') {
        return text.to_string();
    }
    text.to_string()
}

fn summarise_server(tools: &[Tool]) -> String {
    let mut seen = Vec::new();
    for tool in tools {
        let desc = tool.description.clone().unwrap_or_default();
        let sentence = first_sentence(&desc);
        if !sentence.is_empty() && !seen.contains(&sentence) {
            seen.push(sentence);
        }
    }
    let summary = seen.join(" ");
    if summary.chars().count() > MAX_DESCRIPTION_LENGTH {
        let truncated: String = summary.chars().take(MAX_DESCRIPTION_LENGTH - 3).collect();
        format!("{}...", truncated.trim_end())
    } else {
        summary
    }
}

/// Build the compressed per-server manifest embedded in `search-tools`'s
/// description, one line (plus optional summary line) per server, sorted
/// alphabetically.
pub fn generate_manifest(deferred_by_server: &HashMap<String, Vec<Tool>>) -> String {
    let mut server_names: Vec<&String> = deferred_by_server.keys().collect();
    server_names.sort();

    let mut lines = Vec::new();
    for server_name in server_names {
        let tools = &deferred_by_server[server_name];
        let count = tools.len();
        let names_str = if count > 10 {
            let shown: Vec<&str> =
                tools[..MAX_TOOL_NAMES_SHOWN].iter().map(|t| t.name.as_str()).collect();
            format!("{}, ... and {} more", shown.join(", "), count - MAX_TOOL_NAMES_SHOWN)
        } else {
            tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        };

        let summary = summarise_server(tools);
        let tool_word = if count == 1 { "tool" } else { "tools" };
        lines.push(format!("- {server_name} ({count} {tool_word}): {names_str}"));
        if !summary.is_empty() {
            lines.push(format!("  {summary}"));
        }
    }

    lines.join("\n")
}

fn format_param_details(input_schema: &Value) -> String {
    let props = input_schema.get("properties").and_then(Value::as_object);
    let Some(props) = props.filter(|p| !p.is_empty()) else {
        return "  No parameters.".to_string();
    };
    let required: HashSet<&str> = input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    props
        .iter()
        .map(|(pname, pdef)| {
            let ptype = pdef.get("type").and_then(Value::as_str).unwrap_or("any");
            let req_marker = if required.contains(pname.as_str()) { " (required)" } else { "" };
            let pdesc = pdef.get("description").and_then(Value::as_str).unwrap_or("");
            let desc_part = if pdesc.is_empty() { String::new() } else { format!(" - {pdesc}") };
            format!("    - {pname}: {ptype}{req_marker}{desc_part}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_tool_details(server_name: &str, tool: &Tool) -> String {
    let desc = tool.description.clone().unwrap_or_else(|| "(no description)".to_string());
    let header = format!("  [{server_name}] {}: {desc}", tool.name);
    let params = format_param_details(&tool.input_schema);
    format!("{header}\n  Parameters:\n{params}")
}

/// Result of executing a synthetic tool: the text handed back to the LLM,
/// plus any tools that moved from deferred to loaded as a side effect.
/// Kept as an explicit product type rather than smuggled through an
/// exception, per spec.md §9's design note.
#[derive(Debug, Clone)]
pub struct SyntheticToolResult {
    pub content: String,
    pub newly_loaded_tools: Vec<Tool>,
}

/// Arguments accepted by `search-tools`.
#[derive(Debug, Clone, Default)]
pub struct SearchToolsArgs {
    pub query: Option<String>,
    pub server_name: Option<String>,
    pub tool_names: Option<Vec<String>>,
}

impl SearchToolsArgs {
    pub fn from_json(value: &Value) -> Self {
        let query = value.get("query").and_then(Value::as_str).map(str::to_string);
        let server_name = value.get("server_name").and_then(Value::as_str).map(str::to_string);
        let tool_names = value.get("tool_names").and_then(Value::as_array).map(|arr| {
            arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
        });
        Self { query, server_name, tool_names }
    }
}

/// Synthetic tool that lets the LLM discover and load deferred tools via
/// BM25 search, server browsing, or exact name lookup.
pub struct SearchToolsTool {
    search_index: ToolSearchIndex,
    config: ToolDiscoveryConfig,
    server_names: Vec<String>,
    deferred: HashSet<String>,
    loaded: HashSet<String>,
    manifest: String,
}

impl SearchToolsTool {
    pub fn new(
        deferred_by_server: HashMap<String, Vec<Tool>>,
        server_names: Vec<String>,
        config: ToolDiscoveryConfig,
    ) -> Self {
        let manifest = generate_manifest(&deferred_by_server);

        let mut deferred = HashSet::new();
        let mut tool_server_map = HashMap::new();
        let mut all_tools = Vec::new();
        for (server, tools) in &deferred_by_server {
            for tool in tools {
                deferred.insert(tool.name.clone());
                tool_server_map.insert(tool.name.clone(), server.clone());
                all_tools.push(tool.clone());
            }
        }

        let search_index = ToolSearchIndex::new(all_tools, &tool_server_map);

        Self { search_index, config, server_names, deferred, loaded: HashSet::new(), manifest }
    }

    pub fn name(&self) -> &str {
        SEARCH_TOOLS_NAME
    }

    /// The manifest-bearing system prompt (spec.md §4.5) — separate from
    /// the tool's own short description so callers can inject it as a
    /// dedicated system message.
    pub fn system_prompt(&self) -> String {
        format!(
            "Search for and load additional tools that are available but not yet loaded.\n\
             Use this tool to discover tools you need to complete a task.\n\n\
             Available tool servers:\n{}\n\n\
             Provide at least one of: query, server_name, or tool_names.",
            self.manifest
        )
    }

    pub fn definition(&self) -> Tool {
        let mut server_names = self.server_names.clone();
        server_names.sort();
        let input_schema = serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keyword search query to find relevant tools by name or description.",
                },
                "server_name": {
                    "type": "string",
                    "description": format!(
                        "Load all tools from a specific server. Valid servers: {}.",
                        server_names.join(", ")
                    ),
                },
                "tool_names": {
                    "type": "array",
                    "description": "Exact tool names to load.",
                    "items": {"type": "string"},
                },
            },
            "required": [],
        });
        Tool::new(SEARCH_TOOLS_NAME, Some(self.system_prompt()), input_schema)
    }

    /// Execute the tool against parsed arguments, following the resolution
    /// table in spec.md §4.5 exactly.
    pub fn execute(&mut self, args: SearchToolsArgs) -> SyntheticToolResult {
        let query = args.query.filter(|q| !q.trim().is_empty());
        let server_name = args.server_name;
        let tool_names = args.tool_names.filter(|names| !names.is_empty());

        if query.is_none() && server_name.is_none() && tool_names.is_none() {
            return SyntheticToolResult {
                content: "Error: Please provide at least one of: query, server_name, or tool_names."
                    .to_string(),
                newly_loaded_tools: vec![],
            };
        }

        if let Some(server) = &server_name {
            if !self.server_names.contains(server) {
                let mut valid = self.server_names.clone();
                valid.sort();
                return SyntheticToolResult {
                    content: format!(
                        "Error: Unknown server '{server}'. Valid servers: {}.",
                        valid.join(", ")
                    ),
                    newly_loaded_tools: vec![],
                };
            }
        }

        let mut not_found_msg = String::new();
        let results: Vec<(String, Tool)> = if let Some(names) = &tool_names {
            let (found, not_found) = self.search_index.get_by_names(names);
            if !not_found.is_empty() {
                not_found_msg = format!("Not found: {}.", not_found.join(", "));
            }
            match &server_name {
                Some(server) => found.into_iter().filter(|(s, _)| s == server).collect(),
                None => found,
            }
        } else if let (Some(server), Some(q)) = (&server_name, &query) {
            self.search_index.search(q, self.config.max_search_results, Some(server))
        } else if let Some(server) = &server_name {
            self.search_index.get_by_server(server)
        } else {
            self.search_index.search(query.as_deref().unwrap(), self.config.max_search_results, None)
        };

        if results.is_empty() {
            let mut parts = vec!["No tools found".to_string()];
            if let Some(q) = &query {
                parts.push(format!("matching '{q}'"));
            }
            if let Some(server) = &server_name {
                parts.push(format!("in server '{server}'"));
            }
            let mut msg = format!("{}.", parts.join(" "));
            if !not_found_msg.is_empty() {
                msg.push(' ');
                msg.push_str(&not_found_msg);
            }
            return SyntheticToolResult { content: msg, newly_loaded_tools: vec![] };
        }

        let mut newly_loaded = Vec::new();
        let mut already_loaded = Vec::new();
        let mut details_parts = Vec::new();

        for (server, tool) in &results {
            if self.loaded.contains(&tool.name) {
                already_loaded.push(tool.name.clone());
            } else {
                newly_loaded.push(tool.clone());
                self.deferred.remove(&tool.name);
                self.loaded.insert(tool.name.clone());
            }
            details_parts.push(format_tool_details(server, tool));
        }

        let mut content = format!("Found {} tool(s):\n\n{}", results.len(), details_parts.join("\n\n"));
        if !already_loaded.is_empty() {
            content.push_str(&format!("\n\nAlready loaded: {}", already_loaded.join(", ")));
        }
        if !not_found_msg.is_empty() {
            content.push_str(&format!("\n\n{not_found_msg}"));
        }

        tracing::debug!(
            newly_loaded = newly_loaded.len(),
            already_loaded = already_loaded.len(),
            "search-tools executed"
        );

        SyntheticToolResult { content, newly_loaded_tools: newly_loaded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, desc: &str) -> Tool {
        Tool::new(
            name,
            Some(desc.to_string()),
            json!({"type": "object", "properties": {"city": {"type": "string", "description": "City name"}}, "required": ["city"]}),
        )
    }

    fn make(deferred: HashMap<String, Vec<Tool>>) -> SearchToolsTool {
        let servers: Vec<String> = deferred.keys().cloned().collect();
        SearchToolsTool::new(deferred, servers, ToolDiscoveryConfig::default())
    }

    #[test]
    fn no_params_is_an_error() {
        let mut t = make(HashMap::from([(
            "weather".to_string(),
            vec![tool("weather_forecast", "Get the forecast.")],
        )]));
        let result = t.execute(SearchToolsArgs::default());
        assert!(result.content.starts_with("Error: Please provide"));
        assert!(result.newly_loaded_tools.is_empty());
    }

    #[test]
    fn unknown_server_is_an_error() {
        let mut t = make(HashMap::from([(
            "weather".to_string(),
            vec![tool("weather_forecast", "Get the forecast.")],
        )]));
        let result = t.execute(SearchToolsArgs {
            server_name: Some("ghost".into()),
            ..Default::default()
        });
        assert!(result.content.contains("Unknown server 'ghost'"));
    }

    #[test]
    fn tool_names_lookup_moves_tool_into_loaded() {
        let mut t = make(HashMap::from([(
            "weather".to_string(),
            vec![tool("weather_forecast", "Get the forecast.")],
        )]));
        let result = t.execute(SearchToolsArgs {
            tool_names: Some(vec!["weather_forecast".into()]),
            ..Default::default()
        });
        assert_eq!(result.newly_loaded_tools.len(), 1);
        assert!(t.loaded.contains("weather_forecast"));
        assert!(!t.deferred.contains("weather_forecast"));
    }

    #[test]
    fn already_loaded_tool_is_not_returned_twice_as_new() {
        let mut t = make(HashMap::from([(
            "weather".to_string(),
            vec![tool("weather_forecast", "Get the forecast.")],
        )]));
        t.execute(SearchToolsArgs {
            tool_names: Some(vec!["weather_forecast".into()]),
            ..Default::default()
        });
        let second = t.execute(SearchToolsArgs {
            tool_names: Some(vec!["weather_forecast".into()]),
            ..Default::default()
        });
        assert!(second.newly_loaded_tools.is_empty());
        assert!(second.content.contains("Already loaded: weather_forecast"));
    }

    #[test]
    fn manifest_lists_servers_alphabetically_with_summary() {
        let deferred = HashMap::from([
            ("weather".to_string(), vec![tool("weather_forecast", "Get the forecast. Extra detail.")]),
            ("search".to_string(), vec![tool("search_web", "Search the web.")]),
        ]);
        let manifest = generate_manifest(&deferred);
        let search_pos = manifest.find("- search").unwrap();
        let weather_pos = manifest.find("- weather").unwrap();
        assert!(search_pos < weather_pos);
    }

    #[test]
    fn manifest_truncates_long_tool_lists() {
        let mut tools = Vec::new();
        for i in 0..15 {
            tools.push(tool(&format!("t{i}"), "desc"));
        }
        let deferred = HashMap::from([("srv".to_string(), tools)]);
        let manifest = generate_manifest(&deferred);
        assert!(manifest.contains("... and 11 more"));
    }
}
