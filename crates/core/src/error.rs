//! Error types for the toolrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

// --- Bounded context errors ---

/// Failures of the model backend. Always fatal to the current request.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by model backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of a single tool invocation.
///
/// These never abort a request: the orchestrator folds them into the
/// conversation as a tool outcome so the model can respond to them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    Validation(String),

    #[error("Tool server returned status {status}: {body}")]
    ToolServer { status: u16, body: String },

    #[error("Failed to reach tool server: {0}")]
    Transport(String),
}

impl ToolError {
    /// Stable snake_case identifier, shown to the model and written to logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ToolServer { .. } => "tool_server_error",
            Self::Transport(_) => "transport_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("A tool named '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// Terminal failures of one orchestrated request.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error("Model requested unknown tool '{0}'")]
    UnknownTool(String),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Model requested '{tool}' after the round-trip limit of {limit} was reached")]
    RoundTripLimit { limit: u32, tool: String },
}

impl OrchestratorError {
    /// Stable snake_case identifier for callers that log or display failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool_error",
            Self::Generation(_) => "generation_error",
            Self::Cancelled(_) => "cancelled_error",
            Self::RoundTripLimit { .. } => "round_trip_limit_error",
        }
    }
}
