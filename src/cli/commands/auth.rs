use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{load_cli_state, CliSession};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::routing::RedirectDecision;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the console for the current tenant")]
    Login {
        #[arg(help = "Username or email")]
        username: String,
        #[arg(long, env = "CONSOLE_PASSWORD", hide_env_values = true, help = "Password")]
        password: String,
    },

    #[command(about = "Logout and clear the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh the session")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut state = load_cli_state()?;
    let cli = CliSession::open(&state)?;

    let result = match cmd {
        AuthCommands::Login { username, password } => {
            match cli
                .client
                .login(&json!({ "username": username, "password": password }))
                .await
            {
                Ok(session) => output_success(
                    &output_format,
                    &format!("Logged in as {}", username),
                    Some(json!({ "user": session.user, "expires_at": session.expires_at })),
                ),
                Err(e) => output_client_error(&output_format, &e),
            }
        }
        AuthCommands::Logout => match cli.client.logout().await {
            Ok(RedirectDecision::Navigate(destination)) => output_success(
                &output_format,
                "Logged out",
                Some(json!({ "location": destination })),
            ),
            Ok(RedirectDecision::Stay) => output_success(&output_format, "Logged out", None),
            Err(e) => output_client_error(&output_format, &e),
        },
        AuthCommands::Status => {
            let context = cli.client.location().context();
            let session = cli.client.session().get();
            let details = json!({
                "authenticated": session.is_some(),
                "expired": session.as_ref().map(|s| s.is_expired()),
                "expires_at": session.as_ref().and_then(|s| s.expires_at),
                "tenant": context.tenant_slug(),
                "location": context.path,
                "server": cli.client.config().api.base_url,
                "csrf_token": cli.client.session().csrf_token().is_some(),
            });
            let name = if session.is_some() { "authenticated" } else { "anonymous" };
            output_current_item(&output_format, "session", name, details)
        }
        AuthCommands::Refresh => match cli.client.refresh_session().await {
            Ok(()) => output_success(&output_format, "Session refreshed", None),
            Err(e) => output_client_error(&output_format, &e),
        },
        AuthCommands::Whoami => match cli.client.whoami().await {
            Ok(user) => output_value(&output_format, &user),
            Err(e) => output_client_error(&output_format, &e),
        },
    };

    for destination in cli.navigator.history() {
        tracing::info!("Navigated to {}", destination);
    }
    cli.persist(&mut state)?;
    result
}
