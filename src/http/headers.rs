use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::TokenMode;
use crate::routing::{RouteContext, DEFAULT_TENANT};
use crate::session::SessionStore;

pub const X_TENANT_SLUG: HeaderName = HeaderName::from_static("x-tenant-slug");
pub const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");

/// Computes the header set for an outgoing request as of now
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    session: Arc<SessionStore>,
    token_mode: TokenMode,
}

impl HeaderBuilder {
    pub fn new(session: Arc<SessionStore>, token_mode: TokenMode) -> Self {
        Self {
            session,
            token_mode,
        }
    }

    /// Always yields `Content-Type` and `X-Tenant-Slug`; `X-CSRF-Token` once a
    /// token has been observed; `Authorization` only in bearer mode with a
    /// non-empty token held.
    pub fn build(&self, context: &RouteContext) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(X_TENANT_SLUG, tenant_header_value(context));

        if let Some(token) = self.session.csrf_token() {
            match HeaderValue::from_str(&token) {
                Ok(value) => {
                    headers.insert(X_CSRF_TOKEN, value);
                }
                Err(_) => {
                    tracing::warn!("Stored CSRF token is not a valid header value, not sending it")
                }
            }
        }

        if self.token_mode == TokenMode::Bearer {
            let bearer = self
                .session
                .access_token()
                .filter(|t| !t.trim().is_empty())
                .and_then(|t| HeaderValue::from_str(&format!("Bearer {}", t)).ok());
            if let Some(mut value) = bearer {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }
}

fn tenant_header_value(context: &RouteContext) -> HeaderValue {
    // Decoded slugs may hold non-ASCII bytes, which from_bytes accepts as obs-text
    HeaderValue::from_bytes(context.tenant_slug().as_bytes()).unwrap_or_else(|_| {
        tracing::warn!(
            "Tenant slug {:?} is not a valid header value, sending default",
            context.tenant_slug()
        );
        HeaderValue::from_static(DEFAULT_TENANT)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn context(path: &str) -> RouteContext {
        RouteContext::parse(path, &RouteConfig::default().public_routes)
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_tenant_header_derivation() {
        let builder = HeaderBuilder::new(Arc::new(SessionStore::new()), TokenMode::Cookie);

        let acme = builder.build(&context("/t/acme/dashboard"));
        assert_eq!(header(&acme, "x-tenant-slug"), Some("acme"));
        let plain = builder.build(&context("/dashboard"));
        assert_eq!(header(&plain, "x-tenant-slug"), Some("default"));
        assert_eq!(
            header(&builder.build(&context("/t/my%20company/x")), "x-tenant-slug"),
            Some("my company")
        );
    }

    #[test]
    fn test_content_type_always_present() {
        let builder = HeaderBuilder::new(Arc::new(SessionStore::new()), TokenMode::Cookie);
        let headers = builder.build(&context("/"));
        assert_eq!(header(&headers, "content-type"), Some("application/json"));
        assert!(headers.get("x-csrf-token").is_none());
        assert!(headers.get("authorization").is_none());
    }

    #[test]
    fn test_csrf_header_once_observed() {
        let session = Arc::new(SessionStore::new());
        let builder = HeaderBuilder::new(session.clone(), TokenMode::Cookie);
        session.set_csrf_token("abc");
        assert_eq!(header(&builder.build(&context("/t/acme/x")), "x-csrf-token"), Some("abc"));

        session.clear();
        assert_eq!(header(&builder.build(&context("/t/acme/x")), "x-csrf-token"), Some("abc"));
    }

    #[test]
    fn test_bearer_only_in_bearer_mode() {
        let session = Arc::new(SessionStore::new());
        session.set_access_token("jwt-token");

        let cookie = HeaderBuilder::new(session.clone(), TokenMode::Cookie);
        assert!(cookie.build(&context("/")).get("authorization").is_none());

        let bearer = HeaderBuilder::new(session.clone(), TokenMode::Bearer);
        assert_eq!(header(&bearer.build(&context("/")), "authorization"), Some("Bearer jwt-token"));

        session.set_access_token("  ");
        assert!(bearer.build(&context("/")).get("authorization").is_none());
    }
}
