pub mod ask;
pub mod config_cmd;
pub mod generate;
pub mod tool_server;

use toolrelay_config::AppConfig;
use toolrelay_providers::GeminiGateway;

/// Load the config and build the model gateway, or explain how to set a key.
fn gateway_from_config() -> Result<(AppConfig, GeminiGateway), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Ok(api_key) = config.require_api_key() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TOOLRELAY_API_KEY=...");
        eprintln!("    GOOGLE_API_KEY=...");
        eprintln!();
        eprintln!("  Or add `api_key` to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let gateway = GeminiGateway::new(api_key, config.model.request_timeout())?
        .with_base_url(&config.model.api_url);

    Ok((config, gateway))
}
