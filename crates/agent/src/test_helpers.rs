//! Scripted collaborators for orchestrator tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use toolrelay_core::conversation::{ConversationState, Turn};
use toolrelay_core::error::GenerationError;
use toolrelay_core::gateway::{GenerationOutcome, ModelGateway};
use toolrelay_core::tool::{ToolArguments, ToolCallRequest, ToolClient, ToolResult, ToolSpec};

/// What the gateway saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub turns: Vec<Turn>,
    pub tool_names: Vec<String>,
    pub model: String,
}

/// A gateway that returns scripted outcomes in order.
///
/// Panics if called more times than it has outcomes.
pub struct ScriptedGateway {
    outcomes: Mutex<VecDeque<Result<GenerationOutcome, GenerationError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedGateway {
    pub fn new(outcomes: Vec<Result<GenerationOutcome, GenerationError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        state: &ConversationState,
        tools: &[ToolSpec],
        model: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            turns: state.turns().to_vec(),
            tool_names: tools.iter().map(|t| t.name().to_string()).collect(),
            model: model.to_string(),
        });

        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedGateway: no outcome left for call #{}", self.call_count()))
    }
}

/// A gateway that never answers within any reasonable deadline.
pub struct SlowGateway {
    delay: Duration,
}

impl SlowGateway {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ModelGateway for SlowGateway {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(
        &self,
        _state: &ConversationState,
        _tools: &[ToolSpec],
        _model: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        tokio::time::sleep(self.delay).await;
        Ok(GenerationOutcome::FinalAnswer("too late".into()))
    }
}

/// A tool client that returns scripted results and records each call.
pub struct ScriptedToolClient {
    results: Mutex<VecDeque<ToolResult>>,
    calls: Mutex<Vec<(String, ToolArguments)>>,
}

impl ScriptedToolClient {
    pub fn new(results: Vec<ToolResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, ToolArguments)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolClient for ScriptedToolClient {
    async fn invoke(&self, spec: &ToolSpec, arguments: &ToolArguments) -> ToolResult {
        self.calls
            .lock()
            .unwrap()
            .push((spec.name().to_string(), arguments.clone()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedToolClient: no result left for {}", spec.name()))
    }
}

/// A tool client that records the call, then outlasts any deadline.
pub struct SlowToolClient {
    delay: Duration,
    calls: Mutex<usize>,
}

impl SlowToolClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ToolClient for SlowToolClient {
    async fn invoke(&self, _spec: &ToolSpec, _arguments: &ToolArguments) -> ToolResult {
        *self.calls.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        ToolResult::success(serde_json::Value::Null)
    }
}

pub fn answer(text: &str) -> Result<GenerationOutcome, GenerationError> {
    Ok(GenerationOutcome::FinalAnswer(text.to_string()))
}

pub fn call(name: &str, args: serde_json::Value) -> Result<GenerationOutcome, GenerationError> {
    Ok(GenerationOutcome::RequestedCall(ToolCallRequest::new(
        name,
        args.as_object().cloned().unwrap_or_default(),
    )))
}
