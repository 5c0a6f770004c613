//! `toolrelay tool-server`: run the weather tool endpoint.

use toolrelay_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.tool_server.port = port;
    }

    println!("toolrelay tool server");
    println!(
        "   Listening: http://{}:{}",
        config.tool_server.host, config.tool_server.port
    );
    println!("   Tools:     {}", toolrelay_tools::default_registry().names().join(", "));

    toolrelay_gateway::start(&config.tool_server).await?;

    Ok(())
}
