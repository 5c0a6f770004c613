//! The request orchestrator.
//!
//! One request runs as a small state machine:
//!
//! 1. **AwaitingModel**: send the user's prompt and the tool declarations
//! 2. **ToolRequested**: dispatch the tool the model asked for
//! 3. **AwaitingFinal**: send the conversation, now holding the tool outcome
//! 4. **Done** with the model's answer, or **Failed**
//!
//! Tool failures are folded into the conversation for the model to explain.
//! Generation errors and unknown tools end the request.

pub mod orchestrator;

#[cfg(test)]
mod test_helpers;

pub use orchestrator::{Completion, FinalOutput, ModelSelection, Orchestrator};
