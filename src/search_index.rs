//! Tool Search Index (spec.md §4.3): BM25-Okapi ranked keyword search over a
//! deferred-tool catalogue, grounded directly on `tool_search_index.py`.
//!
//! BM25 is hand-rolled rather than pulled from a crate: the formula is
//! fully specified (Okapi BM25, k1=1.5, b=0.75, same as `rank_bm25`'s
//! defaults) and no crate in the retrieval pack has a confirmed usage site
//! to copy — see DESIGN.md.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::Tool;

const K1: f64 = 1.5;
const B: f64 = 0.75;

fn split_re() -> &'static Regex {
    static SPLIT_RE: OnceLock<Regex> = OnceLock::new();
    SPLIT_RE.get_or_init(|| Regex::new(r"[\s_]+").unwrap())
}

/// Lowercase and split on whitespace/underscores. Tool names use
/// underscores as word separators (`search_brave_web_search`), so
/// splitting on both produces more useful BM25 tokens than whitespace
/// alone.
fn tokenize(text: &str) -> Vec<String> {
    split_re()
        .split(&text.to_lowercase())
        .filter(|tok| !tok.is_empty())
        .map(|s| s.to_string())
        .collect()
}

struct IndexedTool {
    tool: Tool,
    server: String,
    doc_tokens: Vec<String>,
}

/// BM25-Okapi index over a (typically deferred) tool catalogue.
pub struct ToolSearchIndex {
    tools: Vec<IndexedTool>,
    by_name: HashMap<String, usize>,
    by_server: HashMap<String, Vec<usize>>,
    avg_doc_len: f64,
    doc_freq: HashMap<String, usize>,
}

impl ToolSearchIndex {
    /// `tool_server_map` maps a tool's name to the server it belongs to.
    pub fn new(tools: Vec<Tool>, tool_server_map: &HashMap<String, String>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_server: HashMap<String, Vec<usize>> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        let indexed: Vec<IndexedTool> = tools
            .into_iter()
            .enumerate()
            .map(|(i, tool)| {
                let server = tool_server_map.get(&tool.name).cloned().unwrap_or_else(|| "unknown".into());
                let doc_text = format!("{} {}", tool.name, tool.description.clone().unwrap_or_default());
                let doc_tokens = tokenize(&doc_text);

                by_name.insert(tool.name.clone(), i);
                by_server.entry(server.clone()).or_default().push(i);

                total_len += doc_tokens.len();
                let mut seen = std::collections::HashSet::new();
                for tok in &doc_tokens {
                    if seen.insert(tok.clone()) {
                        *doc_freq.entry(tok.clone()).or_insert(0) += 1;
                    }
                }

                IndexedTool { tool, server, doc_tokens }
            })
            .collect();

        let avg_doc_len =
            if indexed.is_empty() { 0.0 } else { total_len as f64 / indexed.len() as f64 };

        tracing::debug!(
            tools = indexed.len(),
            servers = by_server.len(),
            "built tool search index"
        );

        Self { tools: indexed, by_name, by_server, avg_doc_len, doc_freq }
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.tools.len() as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn bm25_score(&self, query_tokens: &[String], doc_index: usize) -> f64 {
        let doc = &self.tools[doc_index].doc_tokens;
        let doc_len = doc.len() as f64;
        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for tok in doc {
            *term_freq.entry(tok.as_str()).or_insert(0) += 1;
        }

        query_tokens
            .iter()
            .map(|term| {
                let tf = *term_freq.get(term.as_str()).unwrap_or(&0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let idf = self.idf(term);
                let numer = tf * (K1 + 1.0);
                let denom = tf + K1 * (1.0 - B + B * (doc_len / self.avg_doc_len.max(1e-9)));
                idf * numer / denom
            })
            .sum()
    }

    /// Rank tools by BM25 relevance to `query`. Only positive scores are
    /// returned. When the corpus is too small for BM25's IDF term to
    /// discriminate (every document contains the query term — IDF
    /// collapses to ~0), falls back to raw token-overlap counts so small
    /// or single-tool indexes still return matches.
    pub fn search(
        &self,
        query: &str,
        max_results: usize,
        server_filter: Option<&str>,
    ) -> Vec<(String, Tool)> {
        if self.tools.is_empty() || query.trim().is_empty() {
            return vec![];
        }

        let query_tokens = tokenize(query);

        let mut scored: Vec<(f64, usize)> = (0..self.tools.len())
            .map(|i| (self.bm25_score(&query_tokens, i), i))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            let query_set: std::collections::HashSet<&String> = query_tokens.iter().collect();
            scored = (0..self.tools.len())
                .filter_map(|i| {
                    let overlap = self.tools[i]
                        .doc_tokens
                        .iter()
                        .filter(|t| query_set.contains(t))
                        .count();
                    (overlap > 0).then_some((overlap as f64, i))
                })
                .collect();
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut results = Vec::new();
        for (_, idx) in scored {
            let entry = &self.tools[idx];
            if let Some(filter) = server_filter {
                if entry.server != filter {
                    continue;
                }
            }
            results.push((entry.server.clone(), entry.tool.clone()));
            if results.len() >= max_results {
                break;
            }
        }
        results
    }

    pub fn get_by_server(&self, server_name: &str) -> Vec<(String, Tool)> {
        self.by_server
            .get(server_name)
            .map(|indices| {
                indices.iter().map(|&i| (server_name.to_string(), self.tools[i].tool.clone())).collect()
            })
            .unwrap_or_default()
    }

    /// Look up tools by exact name. Returns `(found, not_found)`; a
    /// repeated name in the input produces a repeated entry in `found`.
    pub fn get_by_names(&self, names: &[String]) -> (Vec<(String, Tool)>, Vec<String>) {
        let mut found = Vec::new();
        let mut not_found = Vec::new();
        for name in names {
            match self.by_name.get(name) {
                Some(&idx) => {
                    let entry = &self.tools[idx];
                    found.push((entry.server.clone(), entry.tool.clone()));
                }
                None => not_found.push(name.clone()),
            }
        }
        (found, not_found)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn server_names(&self) -> Vec<String> {
        self.by_server.keys().cloned().collect()
    }
}
