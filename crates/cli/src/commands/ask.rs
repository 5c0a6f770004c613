//! `toolrelay ask`: run a prompt through the orchestrator.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use toolrelay_agent::{Completion, ModelSelection, Orchestrator};
use toolrelay_core::conversation::{ModelMessage, Turn};
use toolrelay_core::tool::ToolResult;
use toolrelay_tools::{HttpToolClient, default_registry};

const DEFAULT_PROMPT: &str = "Tell me weather in New York City.";

pub async fn run(message: Option<String>, transcript: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (config, gateway) = super::gateway_from_config()?;
    let prompt = message.unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    let tool_client =
        HttpToolClient::new(&config.tool_client.base_url, config.tool_client.timeout())?;

    let orchestrator = Orchestrator::new(
        Arc::new(gateway),
        Arc::new(tool_client),
        Arc::new(default_registry()),
        ModelSelection::new(&config.model.initial_model, &config.model.followup_model),
    )
    .with_max_round_trips(config.orchestrator.max_round_trips)
    .with_excess_call_policy(config.orchestrator.on_excess_call)
    .with_request_timeout(config.orchestrator.request_timeout());

    let token = CancellationToken::new();
    let on_ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match orchestrator.run_with_cancel(prompt, token).await {
        Ok(completion) => {
            print_completion(&completion, transcript);
            Ok(())
        }
        Err(e) => {
            eprintln!("[{}] {e}", e.kind());
            std::process::exit(1);
        }
    }
}

fn print_completion(completion: &Completion, transcript: bool) {
    for turn in completion.conversation.turns() {
        if let Some(line) = tool_activity(turn) {
            println!("{line}");
        }
    }
    println!("{}", completion.text());

    if transcript {
        println!();
        println!("--- transcript ({}) ---", completion.conversation.id());
        for (i, turn) in completion.conversation.turns().iter().enumerate() {
            println!("{:>2}. {}", i + 1, render_turn(turn));
        }
    }
}

/// One line per tool call and tool outcome.
fn tool_activity(turn: &Turn) -> Option<String> {
    match turn {
        Turn::Model(ModelMessage::Call(call)) => Some(format!("tool call: {call}")),
        Turn::ToolOutcome { tool_name, result } => {
            Some(format!("tool result ({tool_name}): {}", render_result(result)))
        }
        _ => None,
    }
}

fn render_turn(turn: &Turn) -> String {
    match turn {
        Turn::User(text) => format!("[user] {text}"),
        Turn::Model(ModelMessage::Text(text)) => format!("[model] {text}"),
        Turn::Model(ModelMessage::Call(call)) => format!("[model_call] {call}"),
        Turn::ToolOutcome { tool_name, result } => {
            format!("[tool_outcome] {tool_name}: {}", render_result(result))
        }
    }
}

fn render_result(result: &ToolResult) -> String {
    match result {
        ToolResult::Success { payload } => payload.to_string(),
        ToolResult::Failure { error } => format!("error [{}] {error}", error.kind()),
    }
}
