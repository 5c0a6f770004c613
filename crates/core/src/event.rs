//! Domain event system: lets observers follow a request without coupling.
//!
//! The orchestrator publishes an event at each step of a request. Subscribers
//! (CLI progress output, tests, metrics exporters) filter for what they need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An orchestrated request began
    RequestStarted {
        conversation_id: String,
        prompt_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The model backend answered a generation call
    ModelResponded {
        conversation_id: String,
        model: String,
        /// Set when the response was a tool call
        requested_tool: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An orchestrated request reached a terminal state
    RequestFinished {
        conversation_id: String,
        outcome: String, // "done" or an error kind
        model_invocations: u32,
        tool_invocations: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
