use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};
use url::Url;

use super::headers::{HeaderBuilder, X_CSRF_TOKEN};
use super::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::error::{ClientError, ClientResult};
use crate::routing::{Location, RouteContext};
use crate::session::SessionStore;

/// One logical request, kept whole so it can be re-issued after a refresh
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    /// Caller headers, applied over the computed defaults
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Sends requests with computed headers and recovers expired sessions.
///
/// A 401 on a non-exempt request hands control to the [`RefreshCoordinator`];
/// once it settles successfully the request is sent again exactly once and
/// that second response is returned whatever its status.
#[derive(Debug, Clone)]
pub struct RequestInterceptor {
    http: Client,
    session: Arc<SessionStore>,
    headers: HeaderBuilder,
    location: Location,
    coordinator: RefreshCoordinator,
    exempt_endpoints: Arc<Vec<String>>,
}

impl RequestInterceptor {
    pub fn new(
        http: Client,
        session: Arc<SessionStore>,
        headers: HeaderBuilder,
        location: Location,
        coordinator: RefreshCoordinator,
        exempt_endpoints: Vec<String>,
    ) -> Self {
        Self {
            http,
            session,
            headers,
            location,
            coordinator,
            exempt_endpoints: Arc::new(exempt_endpoints),
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub async fn execute(&self, request: &ApiRequest) -> ClientResult<Response> {
        let context = self.location.context();
        let exempt = self.is_exempt(request, &context);

        let response = self.send(request, &context).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if exempt {
            tracing::debug!(
                "401 from exempt request {} {}, returning it as-is",
                request.method,
                request.url.path()
            );
            return Ok(response);
        }

        tracing::debug!(
            "401 from {} {}, waiting for session refresh",
            request.method,
            request.url.path()
        );
        match self.coordinator.refresh().await {
            RefreshOutcome::Refreshed => {
                let context = self.location.context();
                let retry = self.send(request, &context).await?;
                if retry.status() == StatusCode::UNAUTHORIZED {
                    tracing::warn!(
                        "{} {} still unauthorized after refresh, not refreshing again",
                        request.method,
                        request.url.path()
                    );
                }
                Ok(retry)
            }
            RefreshOutcome::Failed(reason) => Err(ClientError::session_expired(reason)),
        }
    }

    fn is_exempt(&self, request: &ApiRequest, context: &RouteContext) -> bool {
        if context.is_public {
            return true;
        }
        let path = request.url.path().trim_end_matches('/');
        self.exempt_endpoints
            .iter()
            .map(|endpoint| endpoint.trim_end_matches('/'))
            .any(|endpoint| !endpoint.is_empty() && path.ends_with(endpoint))
    }

    async fn send(&self, request: &ApiRequest, context: &RouteContext) -> ClientResult<Response> {
        let mut headers = self.headers.build(context);
        headers.extend(request.headers.clone());

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        capture_csrf_token(&self.session, &response);
        Ok(response)
    }
}

/// Store the anti-forgery token a response carries, whatever its status
pub(crate) fn capture_csrf_token(session: &SessionStore, response: &Response) {
    let token = response
        .headers()
        .get(X_CSRF_TOKEN)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    if let Some(token) = token {
        if session.set_csrf_token(token) {
            tracing::debug!("CSRF token rotated by response from {}", response.url().path());
        }
    }
}
