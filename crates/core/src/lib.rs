//! # toolrelay core
//!
//! Domain types, traits, and error definitions for the toolrelay
//! function-calling orchestrator. This crate has **no transport
//! dependencies**: it defines the model every other crate implements against.
//!
//! ## Layout
//!
//! - [`tool`]: tool declarations, the registry, argument validation, and the
//!   [`ToolClient`] seam
//! - [`conversation`]: the append-only turn log replayed into every model call
//! - [`gateway`]: the [`ModelGateway`] seam over a generation backend
//! - [`event`]: broadcast domain events for observers
//! - [`error`]: one error enum per bounded context

pub mod conversation;
pub mod error;
pub mod event;
pub mod gateway;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationId, ConversationState, ModelMessage, Turn};
pub use error::{GenerationError, OrchestratorError, RegistryError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use gateway::{GenerationOutcome, ModelGateway};
pub use tool::{
    ArgValue, ExcessCallPolicy, ParamSpec, ParamType, ToolArguments, ToolCallRequest,
    ToolClient, ToolRegistry, ToolResult, ToolSpec, ValidatedArgs,
};
