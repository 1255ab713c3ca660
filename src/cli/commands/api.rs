use clap::Subcommand;
use serde_json::Value;

use crate::cli::config::{load_cli_state, CliSession};
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ApiCommands {
    #[command(about = "GET an API path")]
    Get {
        #[arg(help = "API path, e.g. /api/workflows")]
        path: String,
        #[arg(long = "query", short = 'q', help = "Query parameter as key=value (repeatable)")]
        query: Vec<String>,
    },

    #[command(about = "POST a JSON body from --data or stdin")]
    Post {
        #[arg(help = "API path")]
        path: String,
        #[arg(long, help = "JSON body (reads stdin if omitted)")]
        data: Option<String>,
    },

    #[command(about = "PUT a JSON body from --data or stdin")]
    Put {
        #[arg(help = "API path")]
        path: String,
        #[arg(long, help = "JSON body (reads stdin if omitted)")]
        data: Option<String>,
    },

    #[command(about = "PATCH a JSON body from --data or stdin")]
    Patch {
        #[arg(help = "API path")]
        path: String,
        #[arg(long, help = "JSON body (reads stdin if omitted)")]
        data: Option<String>,
    },

    #[command(about = "DELETE an API path")]
    Delete {
        #[arg(help = "API path")]
        path: String,
    },
}

pub async fn handle(cmd: ApiCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut state = load_cli_state()?;
    let cli = CliSession::open(&state)?;
    let client = &cli.client;

    let response = match cmd {
        ApiCommands::Get { path, query } => {
            if query.is_empty() {
                client.get::<Value>(&path).await
            } else {
                let query = parse_query_pairs(&query)?;
                client.get_with_query::<Value, _>(&path, &query).await
            }
        }
        ApiCommands::Post { path, data } => {
            client.post::<Value, _>(&path, &read_json_body(data)?).await
        }
        ApiCommands::Put { path, data } => {
            client.put::<Value, _>(&path, &read_json_body(data)?).await
        }
        ApiCommands::Patch { path, data } => {
            client.patch::<Value, _>(&path, &read_json_body(data)?).await
        }
        ApiCommands::Delete { path } => client.delete::<Value>(&path).await,
    };

    let result = match response {
        Ok(value) => output_value(&output_format, &value),
        Err(e) => {
            if let Some(destination) = cli.navigator.history().last() {
                eprintln!("Session could not be recovered, sign in again at {}", destination);
            }
            output_client_error(&output_format, &e)
        }
    };

    cli.persist(&mut state)?;
    result
}
