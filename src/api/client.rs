use std::sync::Arc;

use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::{ClientConfig, TokenMode};
use crate::error::{ClientError, ClientResult};
use crate::http::{
    resolve_url, ApiRequest, HeaderBuilder, RefreshCoordinator, RefreshOutcome, RequestInterceptor,
};
use crate::routing::{Location, Navigator, RedirectDecision, RedirectPolicy};
use crate::session::{access_token_from_auth_body, Session, SessionStore};

/// Console API client: verb helpers and JSON handling over the interceptor
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    interceptor: RequestInterceptor,
    session: Arc<SessionStore>,
    location: Location,
    redirect: RedirectPolicy,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        location: Location,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        Self::with_session(config, location, navigator, Arc::new(SessionStore::new()))
    }

    /// Build a client around an existing store, e.g. one restored from disk
    pub fn with_session(
        config: ClientConfig,
        location: Location,
        navigator: Arc<dyn Navigator>,
        session: Arc<SessionStore>,
    ) -> ClientResult<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ClientError::config(format!("Failed to build HTTP client: {}", e)))?;

        let headers = HeaderBuilder::new(session.clone(), config.auth.token_mode);
        let redirect = RedirectPolicy::new(session.clone(), navigator);
        let refresh_url = resolve_url(&config.api.base_url, &config.auth.refresh_endpoint)?;

        let coordinator = RefreshCoordinator::new(
            http.clone(),
            refresh_url,
            config.refresh_timeout(),
            config.auth.token_mode,
            session.clone(),
            headers.clone(),
            location.clone(),
            redirect.clone(),
        );
        let exempt_endpoints = config
            .auth
            .exempt_endpoints()
            .iter()
            .map(|e| e.to_string())
            .collect();
        let interceptor = RequestInterceptor::new(
            http,
            session.clone(),
            headers,
            location.clone(),
            coordinator,
            exempt_endpoints,
        );

        Ok(Self {
            config: Arc::new(config),
            interceptor,
            session,
            location,
            redirect,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn url(&self, path: &str) -> ClientResult<Url> {
        resolve_url(&self.config.api.base_url, path)
    }

    /// True while a session refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.interceptor.coordinator().is_refreshing()
    }

    // --- verb helpers ---

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(Method::GET, self.url(path)?, None::<&()>).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> ClientResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = with_query(self.url(path)?, query)?;
        self.send_json(Method::GET, url, None::<&()>).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, self.url(path)?, Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PUT, self.url(path)?, Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::PATCH, self.url(path)?, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(Method::DELETE, self.url(path)?, None::<&()>).await
    }

    /// Send a request through the interceptor and hand back the raw response.
    ///
    /// Caller headers override the computed ones, so a different
    /// `Content-Type` can be set here.
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<Response> {
        self.interceptor.execute(&request).await
    }

    async fn send_json<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = ApiRequest::new(method, url);
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| {
                ClientError::invalid_request(format!("Failed to encode JSON body: {}", e))
            })?;
            request = request.with_body(bytes);
        }

        let response = self.interceptor.execute(&request).await?;
        decode_response(response).await
    }

    // --- session helpers ---

    /// Log in and record the session the backend returns
    pub async fn login<C: Serialize + ?Sized>(&self, credentials: &C) -> ClientResult<Session> {
        let body: Value = self.post(&self.config.auth.login_endpoint, credentials).await?;

        if self.config.auth.token_mode == TokenMode::Bearer {
            match access_token_from_auth_body(&body) {
                Some(token) => self.session.set_access_token(token),
                None => tracing::warn!("Login response carried no access token in bearer mode"),
            }
        }

        let session = Session::from_auth_body(&body).unwrap_or_else(|| Session::new(body));
        self.session.set(session.clone());
        tracing::info!("Logged in (tenant: {})", self.location.context().tenant_slug());
        Ok(session)
    }

    /// End the session server-side and locally, then leave for the login route
    pub async fn logout(&self) -> ClientResult<RedirectDecision> {
        let url = self.url(&self.config.auth.logout_endpoint)?;
        match self.execute(ApiRequest::new(Method::POST, url)).await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(
                    "Logout endpoint answered {}, clearing session anyway",
                    response.status()
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Logout request failed, clearing session anyway: {}", e),
        }

        Ok(self.redirect.apply(&self.location.context()))
    }

    /// Current user as the backend sees it; refreshes the local session marker
    pub async fn whoami(&self) -> ClientResult<Value> {
        let body: Value = self.get(&self.config.auth.whoami_endpoint).await?;
        let session = Session::from_auth_body(&body).unwrap_or_else(|| Session::new(body.clone()));
        self.session.set(session);
        Ok(body)
    }

    /// Refresh the session now, sharing any refresh already in flight
    pub async fn refresh_session(&self) -> ClientResult<()> {
        match self.interceptor.coordinator().refresh().await {
            RefreshOutcome::Refreshed => Ok(()),
            RefreshOutcome::Failed(reason) => Err(ClientError::session_expired(reason)),
        }
    }
}

/// Decode a JSON response, normalising failures into [`ClientError::Api`]
pub async fn decode_response<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        let body = serde_json::from_slice::<Value>(&bytes).ok();
        return Err(ClientError::api(status, body));
    }

    let parsed = if bytes.is_empty() || status == StatusCode::NO_CONTENT {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(&bytes)
    };

    parsed.map_err(|e| {
        tracing::debug!("Response body did not match the expected type: {}", e);
        ClientError::malformed_body(status)
    })
}

/// Append a serialisable value to the URL query string.
///
/// Objects become `key=value` pairs; arrays repeat the key; nulls are skipped.
pub fn with_query<Q: Serialize + ?Sized>(mut url: Url, query: &Q) -> ClientResult<Url> {
    let value = serde_json::to_value(query)
        .map_err(|e| ClientError::invalid_request(format!("Failed to encode query: {}", e)))?;

    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(url),
        other => {
            return Err(ClientError::invalid_request(format!(
                "Query must serialize to an object, got {}",
                other
            )))
        }
    };

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &map {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for item in items {
                        if let Some(s) = query_value(item) {
                            pairs.append_pair(key, &s);
                        }
                    }
                }
                other => {
                    if let Some(s) = query_value(other) {
                        pairs.append_pair(key, &s);
                    }
                }
            }
        }
    }

    // query_pairs_mut leaves a dangling '?' when nothing was appended
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url)
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_building() {
        let url = Url::parse("http://localhost/api/workflows").unwrap();
        let url = with_query(
            url,
            &json!({ "status": "active", "limit": 20, "tag": ["a", "b"], "owner": null }),
        )
        .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("status".to_string(), "active".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "20".to_string())));
        assert!(pairs.contains(&("tag".to_string(), "a".to_string())));
        assert!(pairs.contains(&("tag".to_string(), "b".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "owner"));
    }

    #[test]
    fn test_empty_query_leaves_url_untouched() {
        let url = Url::parse("http://localhost/api/users").unwrap();
        let url = with_query(url, &json!({ "owner": null })).unwrap();
        assert_eq!(url.as_str(), "http://localhost/api/users");
    }

    #[test]
    fn test_query_rejects_scalars() {
        let url = Url::parse("http://localhost/api/users").unwrap();
        assert!(matches!(with_query(url, &42), Err(ClientError::InvalidRequest(_))));
    }
}
