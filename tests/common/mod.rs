#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use bpm_console_client::{ApiClient, ClientConfig, Location, MemoryNavigator, TokenMode};

/// Knobs and counters of the mock console backend
#[derive(Default)]
pub struct MockState {
    pub session_valid: AtomicBool,
    pub refresh_succeeds: AtomicBool,
    pub refresh_hangs: AtomicBool,
    /// Refresh answers with an `expiresIn` no clock can represent
    pub refresh_overflowing_expiry: AtomicBool,
    /// Logout answers 401 instead of 204
    pub logout_unauthorized: AtomicBool,
    /// Refresh handler holds its answer until this many 401s were served
    pub refresh_wait_for: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub unauthorized_served: AtomicUsize,
    pub workflow_hits: AtomicUsize,
    pub broken_hits: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    /// CSRF header seen by each /api/workflows request, in arrival order
    pub workflow_csrf: Mutex<Vec<Option<String>>>,
}

impl MockState {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(MockState::default());
        state.refresh_succeeds.store(true, Ordering::SeqCst);
        state.refresh_wait_for.store(1, Ordering::SeqCst);

        let app = Router::new()
            .route("/api/workflows", get(workflows))
            .route("/api/broken", get(broken))
            .route("/api/echo", get(echo))
            .route("/api/csrf-error", get(csrf_error))
            .route("/api/malformed", get(malformed))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/login", post(login))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/me", get(me))
            .with_state(state.clone());

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock backend")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        })
    }

    /// Client positioned at `path`, with the navigator that records its redirects
    pub fn client_at(&self, path: &str) -> (ApiClient, Arc<MemoryNavigator>) {
        self.client_with(path, ClientConfig::development())
    }

    pub fn bearer_client_at(&self, path: &str) -> (ApiClient, Arc<MemoryNavigator>) {
        self.client_with(path, ClientConfig::development().with_token_mode(TokenMode::Bearer))
    }

    pub fn client_with(
        &self,
        path: &str,
        config: ClientConfig,
    ) -> (ApiClient, Arc<MemoryNavigator>) {
        let config = config.with_base_url(self.base_url.as_str());
        let location = Location::new(path, config.routes.public_routes.clone());
        let navigator = Arc::new(MemoryNavigator::new(location.clone()));
        let client = ApiClient::new(config, location, navigator.clone()).expect("client builds");
        (client, navigator)
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn unauthorized(state: &MockState) -> Response {
    state.unauthorized_served.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": true, "message": "Session expired", "code": "UNAUTHORIZED" })),
    )
        .into_response()
}

async fn workflows(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.workflow_hits.fetch_add(1, Ordering::SeqCst);
    state.workflow_csrf.lock().unwrap().push(header(&headers, "x-csrf-token"));

    if !state.session_valid.load(Ordering::SeqCst) {
        return unauthorized(&state);
    }
    Json(json!({ "items": [{ "id": "wf-1", "name": "Onboarding" }] })).into_response()
}

async fn broken(State(state): State<Arc<MockState>>) -> Response {
    state.broken_hits.fetch_add(1, Ordering::SeqCst);
    unauthorized(&state)
}

async fn echo(RawQuery(query): RawQuery, headers: HeaderMap) -> Json<Value> {
    Json(json!({
        "query": query,
        "tenant": header(&headers, "x-tenant-slug"),
        "csrf": header(&headers, "x-csrf-token"),
        "authorization": header(&headers, "authorization"),
        "content_type": header(&headers, "content-type"),
    }))
}

async fn csrf_error() -> Response {
    (
        StatusCode::BAD_REQUEST,
        [("x-csrf-token", "abc")],
        Json(json!({ "error": true, "message": "Template name is required" })),
    )
        .into_response()
}

async fn malformed() -> Response {
    let content_type = [("content-type", "application/json")];
    (StatusCode::OK, content_type, "<html>not json</html>").into_response()
}

async fn refresh(State(state): State<Arc<MockState>>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let wanted = state.refresh_wait_for.load(Ordering::SeqCst);
    let deadline = Instant::now() + Duration::from_secs(5);
    while state.unauthorized_served.load(Ordering::SeqCst) < wanted && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Let every 401 reach its client and attach before the refresh settles
    tokio::time::sleep(Duration::from_millis(200)).await;

    if state.refresh_hangs.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    if !state.refresh_succeeds.load(Ordering::SeqCst) {
        let body = json!({ "error": true, "message": "Refresh token revoked" });
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    }

    let expires_in = if state.refresh_overflowing_expiry.load(Ordering::SeqCst) {
        9_999_999_999_999_999i64
    } else {
        900
    };

    state.session_valid.store(true, Ordering::SeqCst);
    (
        StatusCode::OK,
        [("x-csrf-token", "rotated")],
        Json(json!({
            "user": { "id": "u-1", "email": "ops@example.com" },
            "expiresIn": expires_in,
            "accessToken": "jwt-2"
        })),
    )
        .into_response()
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    if body["password"] != "secret" {
        return unauthorized(&state);
    }
    state.session_valid.store(true, Ordering::SeqCst);
    Json(json!({
        "user": { "id": "u-1", "email": "ops@example.com" },
        "expiresIn": 900,
        "accessToken": "jwt-1"
    }))
    .into_response()
}

async fn logout(State(state): State<Arc<MockState>>) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);

    if state.logout_unauthorized.load(Ordering::SeqCst) {
        return unauthorized(&state);
    }
    state.session_valid.store(false, Ordering::SeqCst);
    StatusCode::NO_CONTENT.into_response()
}

async fn me(State(state): State<Arc<MockState>>) -> Response {
    if !state.session_valid.load(Ordering::SeqCst) {
        return unauthorized(&state);
    }
    Json(json!({ "user": { "id": "u-1", "email": "ops@example.com" } })).into_response()
}
