use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::config::{config, ClientConfig, TokenMode};
use crate::routing::{Location, MemoryNavigator};
use crate::session::{SessionSnapshot, SessionStore};

/// CLI state carried between invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliState {
    /// Overrides the configured API base URL when set
    pub server: Option<String>,
    /// Console path the CLI acts from; its tenant segment scopes every request
    pub location: String,
    pub token_mode: Option<TokenMode>,
    #[serde(default)]
    pub session: SessionSnapshot,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for CliState {
    fn default() -> Self {
        Self {
            server: None,
            location: "/".to_string(),
            token_mode: None,
            session: SessionSnapshot::default(),
            updated_at: None,
        }
    }
}

impl CliState {
    /// Effective client configuration: global config plus the saved overrides
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = config().clone();
        if let Some(server) = &self.server {
            client_config = client_config.with_base_url(server.as_str());
        }
        if let Some(mode) = self.token_mode {
            client_config = client_config.with_token_mode(mode);
        }
        client_config
    }
}

/// Client wired to the saved state, plus the navigator recording redirects
pub struct CliSession {
    pub client: ApiClient,
    pub navigator: Arc<MemoryNavigator>,
}

impl CliSession {
    pub fn open(state: &CliState) -> anyhow::Result<Self> {
        let client_config = state.client_config();
        let location = Location::new(&state.location, client_config.routes.public_routes.clone());
        let navigator = Arc::new(MemoryNavigator::new(location.clone()));
        let store = Arc::new(SessionStore::from_snapshot(state.session.clone()));

        let client = ApiClient::with_session(client_config, location, navigator.clone(), store)?;
        Ok(Self { client, navigator })
    }

    /// Write the session and location back so the next invocation resumes here
    pub fn persist(&self, state: &mut CliState) -> anyhow::Result<()> {
        state.session = self.client.session().snapshot();
        state.location = self.client.location().path();
        save_cli_state(state)
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CONSOLE_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("bpm-console").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_cli_state() -> anyhow::Result<CliState> {
    let config_dir = get_config_dir()?;
    let state_file = config_dir.join("state.json");

    if !state_file.exists() {
        return Ok(CliState::default());
    }

    let content = fs::read_to_string(state_file)?;
    let state: CliState = serde_json::from_str(&content)?;
    Ok(state)
}

pub fn save_cli_state(state: &mut CliState) -> anyhow::Result<()> {
    let config_dir = get_config_dir()?;
    let state_file = config_dir.join("state.json");

    state.updated_at = Some(Utc::now());
    let content = serde_json::to_string_pretty(state)?;
    fs::write(state_file, content)?;
    Ok(())
}
