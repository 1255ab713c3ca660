pub mod headers;
pub mod interceptor;
pub mod refresh;

pub use headers::{HeaderBuilder, X_CSRF_TOKEN, X_TENANT_SLUG};
pub use interceptor::{ApiRequest, RequestInterceptor};
pub use refresh::{RefreshCoordinator, RefreshOutcome};

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Resolve an API path against the configured base URL.
///
/// Absolute `http(s)://` URLs pass through; anything else is appended to the
/// base so a base URL with a path prefix keeps it.
pub fn resolve_url(base_url: &str, path: &str) -> ClientResult<Url> {
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    };

    Url::parse(&raw)
        .map_err(|e| ClientError::invalid_request(format!("Invalid URL '{}': {}", raw, e)))
}
