//! Conversation state: the ordered turn log replayed into every model call.
//!
//! The log is append-only. Turns are never edited or removed, so the model
//! always sees the exchange in the order it happened:
//! user prompt → model call request → tool outcome → model answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::{ToolCallRequest, ToolResult};

/// Unique identifier for one orchestrated request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the model said on its turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelMessage {
    Text(String),
    Call(ToolCallRequest),
}

/// One atomic unit of dialogue history.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Model(ModelMessage),
    ToolOutcome { tool_name: String, result: ToolResult },
}

impl Turn {
    /// Short label for logs and transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Turn::User(_) => "user",
            Turn::Model(ModelMessage::Text(_)) => "model",
            Turn::Model(ModelMessage::Call(_)) => "model_call",
            Turn::ToolOutcome { .. } => "tool_outcome",
        }
    }
}

/// The turn log of a single request.
#[derive(Debug, Clone)]
pub struct ConversationState {
    id: ConversationId,
    created_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            created_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    /// Start a conversation with the user's prompt as its first turn.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.push_user(prompt);
        state
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User(text.into()));
    }

    pub fn push_model(&mut self, message: ModelMessage) {
        self.turns.push(Turn::Model(message));
    }

    pub fn push_tool_outcome(&mut self, tool_name: impl Into<String>, result: ToolResult) {
        self.turns.push(Turn::ToolOutcome {
            tool_name: tool_name.into(),
            result,
        });
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
