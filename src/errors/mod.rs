use thiserror::Error;

/// Typed error hierarchy for the chat orchestrator.
///
/// Use at module boundaries (config validation, model resolution, toolset
/// validation, the iteration loop). Anything the LLM itself can recover
/// from (a malformed tool call, a failed tool execution) is never
/// represented here — it is folded into an in-band tool-result string
/// instead.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    ConfigInvalid(String),

    #[error("Could not resolve model '{0}'")]
    ModelUnresolved(String),

    #[error("Toolset validation failed:\n{}", .0.join("\n"))]
    ToolsetValidation(Vec<String>),

    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    #[error("Exceeded maximum chat iterations ({0})")]
    LoopLimitExceeded(usize),

    #[error("Chat call was cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Whether this error is transient and the caller might retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Internal(_) => true,
            Self::ConfigInvalid(_)
            | Self::ModelUnresolved(_)
            | Self::ToolsetValidation(_)
            | Self::LoopLimitExceeded(_)
            | Self::Cancelled => false,
        }
    }
}
