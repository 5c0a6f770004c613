//! toolrelay CLI: the main entry point.
//!
//! Commands:
//! - `ask`          Ask a question; the model may call the weather tool first
//! - `generate`     One plain generation with no tools
//! - `tool-server`  Run the weather tool server
//! - `config`       Show or initialize configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolrelay",
    about = "toolrelay: let a Gemini model call HTTP tools before it answers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question the model may answer with the help of a tool
    Ask {
        /// The prompt to send
        #[arg(short, long)]
        message: Option<String>,

        /// Print every conversation turn after the answer
        #[arg(long)]
        transcript: bool,
    },

    /// Send one prompt without offering any tools
    Generate {
        /// The prompt to send
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the weather tool server
    ToolServer {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            message,
            transcript,
        } => commands::ask::run(message, transcript).await?,
        Commands::Generate { message } => commands::generate::run(message).await?,
        Commands::ToolServer { port } => commands::tool_server::run(port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init()?,
        },
    }

    Ok(())
}
