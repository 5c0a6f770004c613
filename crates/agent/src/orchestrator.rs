//! The orchestrator state machine.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use toolrelay_core::conversation::{ConversationState, ModelMessage};
use toolrelay_core::error::OrchestratorError;
use toolrelay_core::event::{DomainEvent, EventBus};
use toolrelay_core::gateway::{GenerationOutcome, ModelGateway};
use toolrelay_core::tool::{ExcessCallPolicy, ToolCallRequest, ToolClient, ToolRegistry, ToolSpec};
use tracing::{debug, info, warn};

/// Which model serves which generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    /// Used for the first call, which decides whether a tool is needed.
    pub initial: String,
    /// Used for every call after a tool outcome.
    pub followup: String,
}

impl ModelSelection {
    pub fn new(initial: impl Into<String>, followup: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            followup: followup.into(),
        }
    }

    /// Use one model for every call.
    pub fn single(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            initial: model.clone(),
            followup: model,
        }
    }

    fn for_call(&self, prior_calls: u32) -> &str {
        if prior_calls == 0 {
            &self.initial
        } else {
            &self.followup
        }
    }
}

/// How a successful request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalOutput {
    /// The model's answer text (possibly empty).
    Answer(String),
    /// The model asked for one more tool after the round-trip limit.
    /// The call was recorded but never dispatched.
    UnresolvedCall(ToolCallRequest),
}

/// Result of a request that reached `Done`.
#[derive(Debug, Clone)]
pub struct Completion {
    pub output: FinalOutput,
    pub conversation: ConversationState,
    pub model_invocations: u32,
    pub tool_invocations: u32,
    pub round_trips: u32,
}

impl Completion {
    /// Text to show the user.
    pub fn text(&self) -> String {
        match &self.output {
            FinalOutput::Answer(text) => text.clone(),
            FinalOutput::UnresolvedCall(call) => {
                format!("Model requested a further tool call that was not dispatched: {call}")
            }
        }
    }
}

enum State {
    AwaitingModel,
    ToolRequested { call: ToolCallRequest, spec: ToolSpec },
    AwaitingFinal,
    Done(FinalOutput),
    Failed(OrchestratorError),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::AwaitingModel => "awaiting_model",
            State::ToolRequested { .. } => "tool_requested",
            State::AwaitingFinal => "awaiting_final",
            State::Done(_) => "done",
            State::Failed(_) => "failed",
        }
    }
}

/// Drives one request through model call, tool call, and model call.
///
/// Holds only shared, immutable collaborators. Each call to [`run`](Self::run)
/// builds its own conversation, so one orchestrator can serve concurrent
/// requests.
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    tool_client: Arc<dyn ToolClient>,
    registry: Arc<ToolRegistry>,
    models: ModelSelection,

    /// Tool dispatches allowed per request
    max_round_trips: u32,

    excess_call_policy: ExcessCallPolicy,

    /// One deadline shared by every network call of a request
    request_timeout: Option<Duration>,

    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tool_client: Arc<dyn ToolClient>,
        registry: Arc<ToolRegistry>,
        models: ModelSelection,
    ) -> Self {
        Self {
            gateway,
            tool_client,
            registry,
            models,
            max_round_trips: 1,
            excess_call_policy: ExcessCallPolicy::default(),
            request_timeout: None,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Tool dispatches allowed per request. Values below 1 are raised to 1:
    /// the first requested call is always checked against the registry.
    pub fn with_max_round_trips(mut self, max: u32) -> Self {
        self.max_round_trips = max.max(1);
        self
    }

    pub fn with_excess_call_policy(mut self, policy: ExcessCallPolicy) -> Self {
        self.excess_call_policy = policy;
        self
    }

    /// Bound the whole request, all network calls included.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Answer `prompt`, calling tools as the model requests them.
    pub async fn run(&self, prompt: impl Into<String>) -> Result<Completion, OrchestratorError> {
        self.run_with_cancel(prompt, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but aborts at the next network call once
    /// `token` is cancelled.
    pub async fn run_with_cancel(
        &self,
        prompt: impl Into<String>,
        token: CancellationToken,
    ) -> Result<Completion, OrchestratorError> {
        let prompt = prompt.into();
        let conversation = ConversationState::with_prompt(prompt.as_str());
        let conversation_id = conversation.id().to_string();

        info!(
            conversation_id = %conversation_id,
            tools = self.registry.len(),
            max_round_trips = self.max_round_trips,
            "Orchestrating request"
        );
        self.event_bus.publish(DomainEvent::RequestStarted {
            conversation_id: conversation_id.clone(),
            prompt_preview: preview(&prompt),
            timestamp: Utc::now(),
        });

        let mut run = Run {
            orchestrator: self,
            token,
            // A deadline past what the clock can represent is no deadline.
            deadline: self
                .request_timeout
                .and_then(|t| Instant::now().checked_add(t)),
            tools: self.registry.describe_all(),
            conversation,
            model_invocations: 0,
            tool_invocations: 0,
            round_trips: 0,
        };

        let mut state = if run.token.is_cancelled() {
            State::Failed(cancelled())
        } else {
            State::AwaitingModel
        };

        let result = loop {
            debug!(conversation_id = %conversation_id, state = state.name(), "Orchestrator state");
            state = match state {
                State::Done(output) => break Ok(output),
                State::Failed(e) => break Err(e),
                other => run.step(other).await,
            };
        };

        self.event_bus.publish(DomainEvent::RequestFinished {
            conversation_id: conversation_id.clone(),
            outcome: match &result {
                Ok(_) => "done".to_string(),
                Err(e) => e.kind().to_string(),
            },
            model_invocations: run.model_invocations,
            tool_invocations: run.tool_invocations,
            timestamp: Utc::now(),
        });

        match result {
            Ok(output) => {
                info!(
                    conversation_id = %conversation_id,
                    model_invocations = run.model_invocations,
                    tool_invocations = run.tool_invocations,
                    "Request done"
                );
                Ok(Completion {
                    output,
                    conversation: run.conversation,
                    model_invocations: run.model_invocations,
                    tool_invocations: run.tool_invocations,
                    round_trips: run.round_trips,
                })
            }
            Err(e) => {
                info!(conversation_id = %conversation_id, kind = e.kind(), error = %e, "Request failed");
                Err(e)
            }
        }
    }
}

/// Per-request state. Owned by one `run_with_cancel` call.
struct Run<'a> {
    orchestrator: &'a Orchestrator,
    token: CancellationToken,
    deadline: Option<Instant>,
    tools: Vec<ToolSpec>,
    conversation: ConversationState,
    model_invocations: u32,
    tool_invocations: u32,
    round_trips: u32,
}

impl Run<'_> {
    async fn step(&mut self, state: State) -> State {
        match state {
            State::AwaitingModel | State::AwaitingFinal => match self.generate().await {
                Ok(GenerationOutcome::FinalAnswer(text)) => {
                    self.conversation
                        .push_model(ModelMessage::Text(text.clone()));
                    State::Done(FinalOutput::Answer(text))
                }
                Ok(GenerationOutcome::RequestedCall(call)) => self.accept_call(call),
                Err(e) => State::Failed(e),
            },
            State::ToolRequested { call, spec } => match self.dispatch(call, &spec).await {
                Ok(()) => State::AwaitingFinal,
                Err(e) => State::Failed(e),
            },
            terminal => terminal,
        }
    }

    async fn generate(&mut self) -> Result<GenerationOutcome, OrchestratorError> {
        let orchestrator = self.orchestrator;
        let model = orchestrator.models.for_call(self.model_invocations);
        self.model_invocations += 1;

        debug!(
            model = %model,
            turns = self.conversation.len(),
            call = self.model_invocations,
            "Calling model"
        );

        let outcome = self
            .guard(
                orchestrator
                    .gateway
                    .generate(&self.conversation, &self.tools, model),
            )
            .await??;

        orchestrator.event_bus.publish(DomainEvent::ModelResponded {
            conversation_id: self.conversation.id().to_string(),
            model: model.to_string(),
            requested_tool: match &outcome {
                GenerationOutcome::RequestedCall(call) => Some(call.name.clone()),
                GenerationOutcome::FinalAnswer(_) => None,
            },
            timestamp: Utc::now(),
        });

        Ok(outcome)
    }

    /// Decide what to do with a tool call the model just requested.
    fn accept_call(&mut self, call: ToolCallRequest) -> State {
        let orchestrator = self.orchestrator;

        if self.round_trips > 0 && self.round_trips >= orchestrator.max_round_trips {
            return match orchestrator.excess_call_policy {
                ExcessCallPolicy::Surface => {
                    warn!(
                        tool = %call.name,
                        limit = orchestrator.max_round_trips,
                        "Round-trip limit reached, returning tool call undispatched"
                    );
                    self.conversation
                        .push_model(ModelMessage::Call(call.clone()));
                    State::Done(FinalOutput::UnresolvedCall(call))
                }
                ExcessCallPolicy::Fail => State::Failed(OrchestratorError::RoundTripLimit {
                    limit: orchestrator.max_round_trips,
                    tool: call.name,
                }),
            };
        }

        match orchestrator.registry.lookup(&call.name) {
            Ok(spec) => {
                let spec = spec.clone();
                self.conversation
                    .push_model(ModelMessage::Call(call.clone()));
                State::ToolRequested { call, spec }
            }
            Err(_) => State::Failed(OrchestratorError::UnknownTool(call.name)),
        }
    }

    async fn dispatch(
        &mut self,
        call: ToolCallRequest,
        spec: &ToolSpec,
    ) -> Result<(), OrchestratorError> {
        let orchestrator = self.orchestrator;
        debug!(tool = %call, "Dispatching tool call");

        // Counted before the await so a cancelled dispatch is still reported.
        self.tool_invocations += 1;
        let start = std::time::Instant::now();
        let result = self
            .guard(orchestrator.tool_client.invoke(spec, &call.arguments))
            .await?;
        let duration_ms = start.elapsed().as_millis() as u64;
        self.round_trips += 1;

        orchestrator.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        if let Some(e) = result.error() {
            warn!(tool = %call.name, kind = e.kind(), error = %e, "Tool failed, passing error to the model");
        }

        self.conversation.push_tool_outcome(call.name, result);
        Ok(())
    }

    /// Race `fut` against cancellation and the request deadline.
    async fn guard<T>(&self, fut: impl Future<Output = T>) -> Result<T, OrchestratorError> {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(cancelled()),
            _ = expiry => Err(OrchestratorError::Cancelled(format!(
                "request timed out after {:?}",
                self.orchestrator.request_timeout.unwrap_or_default()
            ))),
            out = fut => Ok(out),
        }
    }
}

fn cancelled() -> OrchestratorError {
    OrchestratorError::Cancelled("request cancelled".into())
}

fn preview(prompt: &str) -> String {
    const MAX: usize = 80;
    if prompt.chars().count() <= MAX {
        prompt.to_string()
    } else {
        let mut cut: String = prompt.chars().take(MAX).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use serde_json::json;
    use toolrelay_core::conversation::Turn;
    use toolrelay_core::error::{GenerationError, ToolError};
    use toolrelay_core::tool::{ParamSpec, ParamType, ToolResult};

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolSpec::new("getWeather", "Get the current weather for a location.").with_param(
                    "location",
                    ParamSpec::required(ParamType::String, "City name"),
                ),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn orchestrator(gateway: Arc<ScriptedGateway>, tools: Arc<ScriptedToolClient>) -> Orchestrator {
        Orchestrator::new(
            gateway,
            tools,
            registry(),
            ModelSelection::new("gemini-2.5-pro", "gemini-2.5-flash"),
        )
    }

    fn paris() -> serde_json::Value {
        json!({
            "location": "Paris",
            "temperature_celsius": 18,
            "condition": "Cloudy",
            "wind_speed_kph": 12
        })
    }

    #[tokio::test]
    async fn direct_answer_needs_one_model_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![answer(
            "Fibonacci: 0,1,1,2,3,5,8,13,21,34",
        )]));
        let tools = Arc::new(ScriptedToolClient::new(vec![]));

        let completion = orchestrator(gateway.clone(), tools.clone())
            .run("Give me a Fibonacci sequence up to 10th number")
            .await
            .unwrap();

        assert_eq!(
            completion.output,
            FinalOutput::Answer("Fibonacci: 0,1,1,2,3,5,8,13,21,34".into())
        );
        assert_eq!(gateway.call_count(), 1);
        assert_eq!(tools.call_count(), 0);
        assert_eq!(completion.model_invocations, 1);
        assert_eq!(completion.round_trips, 0);
    }

    #[tokio::test]
    async fn tool_round_trip_then_answer() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            answer("It is mild and cloudy in London."),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(
            json!({"location": "London", "temperature_celsius": 14}),
        )]));

        let completion = orchestrator(gateway.clone(), tools.clone())
            .run("Tell me weather in London.")
            .await
            .unwrap();

        assert_eq!(completion.text(), "It is mild and cloudy in London.");
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(tools.call_count(), 1);
        assert_eq!(tools.calls()[0].0, "getWeather");

        let labels: Vec<_> = completion.conversation.turns().iter().map(Turn::label).collect();
        assert_eq!(labels, vec!["user", "model_call", "tool_outcome", "model"]);
    }

    #[tokio::test]
    async fn models_switch_after_first_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            answer("ok"),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));

        orchestrator(gateway.clone(), tools).run("weather?").await.unwrap();

        let models: Vec<_> = gateway.requests().into_iter().map(|r| r.model).collect();
        assert_eq!(models, vec!["gemini-2.5-pro", "gemini-2.5-flash"]);
    }

    #[tokio::test]
    async fn tool_payload_reaches_second_model_call_unchanged() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "Paris"})),
            answer("Cloudy, 18C."),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(paris())]));

        orchestrator(gateway.clone(), tools).run("Weather in Paris?").await.unwrap();

        let second = &gateway.requests()[1];
        assert_eq!(second.tool_names, vec!["getWeather"]);
        assert_eq!(
            second.turns[2],
            Turn::ToolOutcome {
                tool_name: "getWeather".into(),
                result: ToolResult::success(paris()),
            }
        );
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_dispatch() {
        let gateway = Arc::new(ScriptedGateway::new(vec![call(
            "getForecast",
            json!({"location": "London"}),
        )]));
        let tools = Arc::new(ScriptedToolClient::new(vec![]));

        let err = orchestrator(gateway.clone(), tools.clone())
            .run("forecast?")
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::UnknownTool(ref name) if name == "getForecast"));
        assert_eq!(err.kind(), "unknown_tool_error");
        assert_eq!(tools.call_count(), 0);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_failure_is_passed_to_the_model() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            answer("The weather service is unavailable."),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::failure(
            ToolError::ToolServer {
                status: 500,
                body: "internal error".into(),
            },
        )]));

        let completion = orchestrator(gateway.clone(), tools).run("weather?").await.unwrap();

        assert_eq!(gateway.call_count(), 2);
        match &gateway.requests()[1].turns[2] {
            Turn::ToolOutcome { result, .. } => {
                let error = result.error().unwrap();
                assert_eq!(error.kind(), "tool_server_error");
                assert!(error.to_string().contains("500"));
            }
            other => panic!("expected a tool outcome, got {other:?}"),
        }
        assert_eq!(completion.text(), "The weather service is unavailable.");
    }

    #[tokio::test]
    async fn excess_call_is_surfaced_by_default() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            call("getWeather", json!({"location": "Paris"})),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));

        let completion = orchestrator(gateway.clone(), tools.clone())
            .run("weather in two cities?")
            .await
            .unwrap();

        assert_eq!(tools.call_count(), 1);
        match &completion.output {
            FinalOutput::UnresolvedCall(call) => {
                assert_eq!(call.arguments["location"], "Paris");
            }
            other => panic!("expected an unresolved call, got {other:?}"),
        }
        assert!(completion.text().contains("getWeather"));
        let labels: Vec<_> = completion.conversation.turns().iter().map(Turn::label).collect();
        assert_eq!(labels, vec!["user", "model_call", "tool_outcome", "model_call"]);
    }

    #[tokio::test]
    async fn excess_call_fails_under_fail_policy() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            call("getWeather", json!({"location": "Paris"})),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));

        let err = orchestrator(gateway, tools.clone())
            .with_excess_call_policy(ExcessCallPolicy::Fail)
            .run("weather in two cities?")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::RoundTripLimit { limit: 1, ref tool } if tool == "getWeather"
        ));
        assert_eq!(tools.call_count(), 1);
    }

    #[tokio::test]
    async fn higher_limit_allows_chained_calls() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            call("getWeather", json!({"location": "Paris"})),
            answer("London is mild, Paris is cloudy."),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![
            ToolResult::success(json!({"location": "London"})),
            ToolResult::success(paris()),
        ]));

        let completion = orchestrator(gateway.clone(), tools.clone())
            .with_max_round_trips(2)
            .run("weather in two cities?")
            .await
            .unwrap();

        assert_eq!(completion.text(), "London is mild, Paris is cloudy.");
        assert_eq!(completion.round_trips, 2);
        assert_eq!(gateway.call_count(), 3);
        assert_eq!(tools.call_count(), 2);
        assert_eq!(completion.conversation.len(), 6);
    }

    #[tokio::test]
    async fn unknown_tool_on_followup_still_fails() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            call("getForecast", json!({"location": "London"})),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));

        let err = orchestrator(gateway, tools)
            .with_max_round_trips(2)
            .run("weather?")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownTool(_)));
    }

    #[tokio::test]
    async fn generation_error_on_followup_is_fatal() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            Err(GenerationError::MalformedResponse("No candidates in response".into())),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));

        let err = orchestrator(gateway, tools).run("weather?").await.unwrap_err();
        assert_eq!(err.kind(), "generation_error");
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![answer("unused")]));
        let tools = Arc::new(ScriptedToolClient::new(vec![]));
        let token = CancellationToken::new();
        token.cancel();

        let err = orchestrator(gateway.clone(), tools)
            .run_with_cancel("hello", token)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Cancelled(ref m) if m == "request cancelled"));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_hits_request_timeout() {
        let gateway = Arc::new(SlowGateway::new(Duration::from_secs(30)));
        let tools = Arc::new(ScriptedToolClient::new(vec![]));

        let orchestrator = Orchestrator::new(gateway, tools, registry(), ModelSelection::single("m"))
            .with_request_timeout(Some(Duration::from_secs(1)));

        let err = orchestrator.run("hello").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Cancelled(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn events_trace_the_request() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            answer("Mild."),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();

        orchestrator(gateway, tools)
            .with_event_bus(bus)
            .run("weather?")
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::RequestStarted { .. } => "started",
                DomainEvent::ModelResponded { .. } => "model",
                DomainEvent::ToolExecuted { success, .. } => {
                    assert!(success);
                    "tool"
                }
                DomainEvent::RequestFinished { outcome, .. } => {
                    assert_eq!(outcome, "done");
                    "finished"
                }
            });
        }
        assert_eq!(names, vec!["started", "model", "tool", "model", "finished"]);
    }

    #[tokio::test]
    async fn zero_round_trip_limit_still_checks_the_registry() {
        let gateway = Arc::new(ScriptedGateway::new(vec![call(
            "getForecast",
            json!({"location": "London"}),
        )]));
        let tools = Arc::new(ScriptedToolClient::new(vec![]));

        let err = orchestrator(gateway, tools.clone())
            .with_max_round_trips(0)
            .run("forecast?")
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::UnknownTool(ref name) if name == "getForecast"));
        assert_eq!(tools.call_count(), 0);
    }

    #[tokio::test]
    async fn zero_round_trip_limit_dispatches_one_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            call("getWeather", json!({"location": "London"})),
            answer("Mild."),
        ]));
        let tools = Arc::new(ScriptedToolClient::new(vec![ToolResult::success(json!({}))]));

        let completion = orchestrator(gateway, tools.clone())
            .with_max_round_trips(0)
            .run("weather?")
            .await
            .unwrap();

        assert_eq!(completion.text(), "Mild.");
        assert_eq!(tools.call_count(), 1);
    }

    #[tokio::test]
    async fn unrepresentable_timeout_means_no_deadline() {
        let gateway = Arc::new(ScriptedGateway::new(vec![answer("hello")]));
        let tools = Arc::new(ScriptedToolClient::new(vec![]));

        let completion = orchestrator(gateway, tools)
            .with_request_timeout(Some(Duration::MAX))
            .run("hi")
            .await
            .unwrap();

        assert_eq!(completion.text(), "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn tool_call_cut_off_by_timeout_is_still_counted() {
        let gateway = Arc::new(ScriptedGateway::new(vec![call(
            "getWeather",
            json!({"location": "London"}),
        )]));
        let tools = Arc::new(SlowToolClient::new(Duration::from_secs(30)));
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();

        let err = Orchestrator::new(gateway, tools.clone(), registry(), ModelSelection::single("m"))
            .with_request_timeout(Some(Duration::from_secs(1)))
            .with_event_bus(bus)
            .run("weather?")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "cancelled_error");
        assert_eq!(tools.call_count(), 1);

        let mut finished = None;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::RequestFinished {
                tool_invocations, ..
            } = event.as_ref()
            {
                finished = Some(*tool_invocations);
            }
        }
        assert_eq!(finished, Some(1));
    }

    #[test]
    fn preview_truncates_long_prompts() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(100);
        assert_eq!(preview(&long).chars().count(), 81);
    }
}
