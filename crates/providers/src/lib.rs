//! Model gateway implementations for toolrelay.
//!
//! All gateways implement the `toolrelay_core::ModelGateway` trait.

pub mod gemini;

pub use gemini::GeminiGateway;
