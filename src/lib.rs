#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating hundreds of pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Intentional casts throughout tool-call/token-count bookkeeping
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
// The chat loop is naturally long; splitting it would be artificial
#![allow(clippy::too_many_lines)]

pub mod config;
pub mod errors;
pub mod llm;
pub mod mcp;
pub mod model;
pub mod orchestrator;
pub mod partition;
pub mod result_style;
pub mod search_index;
pub mod search_tools;
pub mod stats;
pub mod tool_cache;
pub mod toolset;

pub use errors::ChatError;
pub use llm::{LlmAdapter, ModelFactory, ModelRef};
pub use mcp::McpTransport;
pub use model::{ChatMessage, Tool, ToolCall};
pub use orchestrator::{ChatOrchestrator, ChatOrchestratorConfig};
pub use stats::ChatStats;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
