//! Tool-result formatting styles (spec.md §4.6.3, SPEC_FULL.md §B.4),
//! controlled by the `TOOL_RESULT_FORMAT` env var.

use crate::model::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultStyle {
    #[default]
    Result,
    FunctionResult,
    FunctionArgsResult,
}

impl ResultStyle {
    pub fn from_env() -> Self {
        match std::env::var("TOOL_RESULT_FORMAT").ok().as_deref() {
            Some("function_result") => Self::FunctionResult,
            Some("function_args_result") => Self::FunctionArgsResult,
            _ => Self::Result,
        }
    }
}

/// Wrap a tool's normalized result content according to `style`.
pub fn format_tool_result(tool_call: &ToolCall, content: &str, style: ResultStyle) -> String {
    match style {
        ResultStyle::Result => content.to_string(),
        ResultStyle::FunctionResult => format!("{}(...) -> {}", tool_call.function.name, content),
        ResultStyle::FunctionArgsResult => {
            format!("{}({}) -> {}", tool_call.function.name, tool_call.function.arguments, content)
        }
    }
}
