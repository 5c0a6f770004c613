//! `toolrelay generate`: one generation, no tools offered.

use toolrelay_core::conversation::ConversationState;
use toolrelay_core::gateway::{GenerationOutcome, ModelGateway};

const DEFAULT_PROMPT: &str = "Give me a Fibonacci sequence up to 10th number";

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, gateway) = super::gateway_from_config()?;
    let prompt = message.unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    let state = ConversationState::with_prompt(prompt);
    match gateway
        .generate(&state, &[], &config.model.initial_model)
        .await
    {
        Ok(GenerationOutcome::FinalAnswer(text)) => println!("{text}"),
        // Only possible if the backend invents a tool.
        Ok(GenerationOutcome::RequestedCall(call)) => {
            println!("Model requested a tool although none was offered: {call}");
        }
        Err(e) => {
            eprintln!("[generation_error] {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
