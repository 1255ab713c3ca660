pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "console")]
#[command(about = "Console CLI - authenticated access to the BPM admin console API")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        conflicts_with = "json",
        help = "Output in human-readable text format (default)"
    )]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "Authenticated API requests")]
    Api {
        #[command(subcommand)]
        cmd: commands::api::ApiCommands,
    },

    #[command(about = "Server, tenant and location selection")]
    Context {
        #[command(subcommand)]
        cmd: commands::context::ContextCommands,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        match (cli.text, cli.json) {
            (false, true) => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, output_format).await,
        Commands::Api { cmd } => commands::api::handle(cmd, output_format).await,
        Commands::Context { cmd } => commands::context::handle(cmd, output_format).await,
    }
}
