//! taskloom CLI: the main entry point.
//!
//! Commands:
//! - `run`     Run an agent on a prompt until it terminates
//! - `plan`    Run the planning agent and print the final plan
//! - `config`  Initialize, show, or validate configuration

use clap::{Parser, Subcommand};
use taskloom_agent::Preset;

mod commands;

#[derive(Parser)]
#[command(
    name = "taskloom",
    about = "taskloom: autonomous agents that think, act, and follow a plan",
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
    /// Run an agent on a prompt
    Run {
        /// The request; read from stdin when omitted
        prompt: Option<String>,

        /// Which agent to run (toolcall, general, swe, planning)
        #[arg(short, long, default_value_t = Preset::General)]
        agent: Preset,
    },

    /// Create a plan for the prompt and work through it
    Plan {
        /// The request; read from stdin when omitted
        prompt: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
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
        Commands::Run { prompt, agent } => commands::run::run(agent, prompt).await?,
        Commands::Plan { prompt } => commands::run::plan(prompt).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config_cmd::init().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
