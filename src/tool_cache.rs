//! Tool Cache (spec.md §4.1).
//!
//! Caches a server's `list_tools()` response behind a TTL, refreshing under
//! an exclusive lock with a double-check so concurrent callers during a
//! refresh all observe the same post-refresh list and version. Grounded on
//! `tool_cache.py`'s `ToolCache` and the teacher's `CacheMiddleware`
//! (`agent/tools/registry/mod.rs`), which uses the same
//! mutex-guarded-refresh-with-TTL shape for per-call result caching.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::mcp::McpTransport;
use crate::model::Tool;

struct CacheState {
    tools: Vec<Tool>,
    fetched_at: Instant,
}

/// Caches the tool catalogue fetched from an `McpTransport`.
///
/// `version` increases every time the cache is (re)populated — by
/// `get_tools` refreshing, or by `prime` — and never decreases. It never
/// advances on a failed refresh; the prior cached value is retained.
pub struct ToolCache {
    transport: Arc<dyn McpTransport>,
    ttl: Option<Duration>,
    state: Mutex<Option<CacheState>>,
    version: AtomicU64,
}

impl ToolCache {
    /// `ttl = None` means the cache never expires on its own (only
    /// `invalidate()` forces a refresh).
    pub fn new(transport: Arc<dyn McpTransport>, ttl: Option<Duration>) -> Self {
        Self { transport, ttl, state: Mutex::new(None), version: AtomicU64::new(0) }
    }

    fn is_expired(state: &Option<CacheState>, ttl: Option<Duration>) -> bool {
        let Some(state) = state else { return true };
        match ttl {
            None => false,
            Some(ttl) => state.fetched_at.elapsed() > ttl,
        }
    }

    /// Return the cached tool list, refreshing from the transport if
    /// expired, forced, or never populated.
    pub async fn get_tools(&self, force_refresh: bool) -> anyhow::Result<Vec<Tool>> {
        {
            let state = self.state.lock().await;
            if !force_refresh && !Self::is_expired(&state, self.ttl) {
                if let Some(state) = state.as_ref() {
                    return Ok(state.tools.clone());
                }
            }
        }

        let mut state = self.state.lock().await;
        // Double-check: another caller may have refreshed while we waited
        // for the lock.
        if !force_refresh && !Self::is_expired(&state, self.ttl) {
            if let Some(state) = state.as_ref() {
                return Ok(state.tools.clone());
            }
        }

        tracing::debug!("refreshing MCP tool cache");
        let tools = self.transport.list_tools().await?;
        *state = Some(CacheState { tools: tools.clone(), fetched_at: Instant::now() });
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(tools)
    }

    /// Clear the cached tools; the next `get_tools` call refetches.
    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    /// Seed the cache with a known tool list without contacting the
    /// transport. Bumps `version` the same as a real refresh.
    pub async fn prime(&self, tools: Vec<Tool>) {
        *self.state.lock().await = Some(CacheState { tools, fetched_at: Instant::now() });
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Current cache version. Readable without blocking on the refresh
    /// lock.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// The underlying transport, for callers that need to dispatch tool
    /// calls directly rather than through the cached catalogue.
    pub fn transport(&self) -> &dyn McpTransport {
        self.transport.as_ref()
    }
}
