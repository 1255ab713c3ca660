use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{load_cli_state, save_cli_state};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::TokenMode;
use crate::routing::RouteContext;

#[derive(Subcommand)]
pub enum ContextCommands {
    #[command(about = "Show the current server, location and tenant")]
    Current,

    #[command(about = "Move to a console path, e.g. /t/acme/dashboard")]
    Use {
        #[arg(help = "Console path; its /t/<slug> segment selects the tenant")]
        path: String,
    },

    #[command(about = "Point the CLI at an API server")]
    Server {
        #[arg(help = "Base URL, e.g. https://console.example.com")]
        url: String,
    },

    #[command(about = "Choose where access credentials are kept")]
    TokenMode {
        #[arg(value_parser = ["cookie", "bearer"], help = "cookie or bearer")]
        mode: String,
    },
}

pub async fn handle(cmd: ContextCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut state = load_cli_state()?;

    match cmd {
        ContextCommands::Current => {
            let client_config = state.client_config();
            let context = RouteContext::parse(&state.location, &client_config.routes.public_routes);
            output_current_item(
                &output_format,
                "context",
                &context.path,
                json!({
                    "server": client_config.api.base_url,
                    "tenant": context.tenant_slug(),
                    "public": context.is_public.to_string(),
                    "token_mode": format!("{:?}", client_config.auth.token_mode).to_lowercase(),
                }),
            )
        }
        ContextCommands::Use { path } => {
            let path = if path.starts_with('/') { path } else { format!("/{}", path) };
            let context = RouteContext::parse(&path, &state.client_config().routes.public_routes);
            state.location = context.path.clone();
            save_cli_state(&mut state)?;
            output_success(
                &output_format,
                &format!("Switched to {} (tenant: {})", context.path, context.tenant_slug()),
                Some(json!({ "location": context.path, "tenant": context.tenant_slug() })),
            )
        }
        ContextCommands::Server { url } => {
            url::Url::parse(&url)
                .map_err(|e| anyhow::anyhow!("Invalid server URL '{}': {}", url, e))?;
            state.server = Some(url.trim_end_matches('/').to_string());
            // Session state belongs to the previous server
            state.session = Default::default();
            save_cli_state(&mut state)?;
            output_success(&output_format, &format!("Using server {}", url), None)
        }
        ContextCommands::TokenMode { mode } => {
            state.token_mode = Some(if mode == "bearer" {
                TokenMode::Bearer
            } else {
                TokenMode::Cookie
            });
            save_cli_state(&mut state)?;
            output_success(&output_format, &format!("Token mode set to {}", mode), None)
        }
    }
}
