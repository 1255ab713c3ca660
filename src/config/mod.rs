use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub routes: RouteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Where access credentials live between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// HTTP-only cookie managed by the cookie store, never read by the client
    Cookie,
    /// Access token held client-side and sent as `Authorization: Bearer`
    Bearer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token_mode: TokenMode,
    pub login_endpoint: String,
    pub refresh_endpoint: String,
    pub logout_endpoint: String,
    pub whoami_endpoint: String,
    /// Upper bound on a single refresh call; elapsing it counts as a refresh failure
    pub refresh_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route suffixes that are reachable without a session, both globally
    /// (`/<suffix>`) and per tenant (`/t/<slug>/<suffix>`)
    pub public_routes: Vec<String>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("CONSOLE_API_URL") {
            self.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("CONSOLE_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("CONSOLE_CONNECT_TIMEOUT_SECS") {
            self.api.connect_timeout_secs = v.parse().unwrap_or(self.api.connect_timeout_secs);
        }

        // Auth overrides
        if let Ok(v) = env::var("CONSOLE_TOKEN_MODE") {
            self.auth.token_mode = match v.to_lowercase().as_str() {
                "bearer" => TokenMode::Bearer,
                "cookie" => TokenMode::Cookie,
                _ => self.auth.token_mode,
            };
        }
        if let Ok(v) = env::var("CONSOLE_REFRESH_TIMEOUT_SECS") {
            self.auth.refresh_timeout_secs = v.parse().unwrap_or(self.auth.refresh_timeout_secs);
        }

        // Route overrides
        if let Ok(v) = env::var("CONSOLE_PUBLIC_ROUTES") {
            self.routes.public_routes = v
                .split(',')
                .map(|s| s.trim().trim_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    /// Development defaults, also the baseline for tests and library callers
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                request_timeout_secs: 120,
                connect_timeout_secs: 10,
            },
            auth: AuthConfig::default(),
            routes: RouteConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging.example.com".to_string(),
                request_timeout_secs: 60,
                connect_timeout_secs: 10,
            },
            auth: AuthConfig::default(),
            routes: RouteConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://app.example.com".to_string(),
                request_timeout_secs: 30,
                connect_timeout_secs: 5,
            },
            auth: AuthConfig {
                refresh_timeout_secs: 15,
                ..AuthConfig::default()
            },
            routes: RouteConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_mode(mut self, token_mode: TokenMode) -> Self {
        self.auth.token_mode = token_mode;
        self
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.refresh_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_mode: TokenMode::Cookie,
            login_endpoint: "/api/auth/login".to_string(),
            refresh_endpoint: "/api/auth/refresh".to_string(),
            logout_endpoint: "/api/auth/logout".to_string(),
            whoami_endpoint: "/api/auth/me".to_string(),
            refresh_timeout_secs: 30,
        }
    }
}

impl AuthConfig {
    /// Endpoints whose 401 is a terminal answer rather than an expired session
    pub fn exempt_endpoints(&self) -> [&str; 3] {
        [
            self.login_endpoint.as_str(),
            self.refresh_endpoint.as_str(),
            self.logout_endpoint.as_str(),
        ]
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            public_routes: vec![
                "login".to_string(),
                "forgot-password".to_string(),
                "reset-password".to_string(),
                "sso/callback".to_string(),
            ],
        }
    }
}

// Global singleton config - initialized once on first use
pub static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static ClientConfig {
    &CONFIG
}
