//! Switchboard CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Start the HTTP gateway
//! - `models` — Print each configured provider's live model list

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "switchboard",
    about = "Switchboard — model-routed actor chat runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(short, long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print each provider's live model list
    Models,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = switchboard_config::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            switchboard_gateway::serve(config).await?;
        }
        Commands::Models => {
            let registry = switchboard_providers::build_from_config(&config);
            if registry.is_empty() {
                eprintln!("No providers configured.");
                std::process::exit(1);
            }

            for entry in registry.available_models().await {
                println!("{}:", entry.provider);
                if entry.models.is_empty() {
                    println!("  (unreachable or no models)");
                }
                for model in entry.models {
                    println!("  {model}");
                }
            }
        }
    }

    Ok(())
}
