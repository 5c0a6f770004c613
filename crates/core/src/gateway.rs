//! Model gateway trait: the abstraction over generation backends.
//!
//! A gateway turns the whole conversation plus the offered tools into one
//! backend request and reports back either an answer or a tool call. It keeps
//! no state between calls.

use async_trait::async_trait;

use crate::conversation::ConversationState;
use crate::error::GenerationError;
use crate::tool::{ToolCallRequest, ToolSpec};

/// What the model produced for one generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// Natural-language text (possibly empty).
    FinalAnswer(String),
    /// The model wants a tool executed before it answers.
    RequestedCall(ToolCallRequest),
}

/// The core ModelGateway trait.
///
/// The orchestrator calls `generate()` without knowing which backend sits
/// behind it. Errors are fatal to the request and are not retried here.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this backend (e.g. "gemini").
    fn name(&self) -> &str;

    async fn generate(
        &self,
        state: &ConversationState,
        tools: &[ToolSpec],
        model: &str,
    ) -> Result<GenerationOutcome, GenerationError>;
}
