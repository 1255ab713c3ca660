pub mod redirect;

pub use redirect::{RedirectDecision, RedirectPolicy};

use std::sync::{Arc, Mutex, RwLock};

/// Tenant slug sent when the path carries no `/t/<slug>` segment
pub const DEFAULT_TENANT: &str = "default";

pub const LOGIN_ROUTE: &str = "login";

/// Routing facts about the current path, computed once per navigation and
/// handed to the header builder, redirect policy and interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteContext {
    pub path: String,
    /// Percent-decoded tenant slug
    pub tenant: Option<String>,
    /// Tenant segment exactly as it appeared in the path
    tenant_segment: Option<String>,
    /// Path below the tenant prefix, without leading or trailing slashes
    route: String,
    pub is_public: bool,
}

impl RouteContext {
    pub fn parse(path: &str, public_routes: &[String]) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (tenant_segment, rest) = match segments.as_slice() {
            ["t", slug, rest @ ..] => (Some(slug.to_string()), rest),
            _ => (None, segments.as_slice()),
        };
        let route = rest.join("/");
        let tenant = tenant_segment.as_deref().map(decode_slug);

        let is_public = public_routes.iter().any(|public| {
            let public = public.trim_matches('/');
            !public.is_empty()
                && (route == public || route.starts_with(&format!("{}/", public)))
        });

        Self {
            path,
            tenant,
            tenant_segment,
            route,
            is_public,
        }
    }

    /// Tenant slug for the `X-Tenant-Slug` header
    pub fn tenant_slug(&self) -> &str {
        self.tenant.as_deref().unwrap_or(DEFAULT_TENANT)
    }

    /// Login route for the resolved tenant, or the global one
    pub fn login_route(&self) -> String {
        match &self.tenant_segment {
            Some(segment) => format!("/t/{}/{}", segment, LOGIN_ROUTE),
            None => format!("/{}", LOGIN_ROUTE),
        }
    }

    pub fn is_login_route(&self) -> bool {
        self.route == LOGIN_ROUTE
    }
}

fn decode_slug(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => {
            tracing::warn!(
                "Tenant segment '{}' is not valid UTF-8 once decoded, using it as-is",
                segment
            );
            segment.to_string()
        }
    }
}

/// Shared handle on the current path. Clones observe the same location.
#[derive(Debug, Clone)]
pub struct Location {
    current: Arc<RwLock<RouteContext>>,
    public_routes: Arc<Vec<String>>,
}

impl Location {
    pub fn new(path: &str, public_routes: Vec<String>) -> Self {
        let context = RouteContext::parse(path, &public_routes);
        Self {
            current: Arc::new(RwLock::new(context)),
            public_routes: Arc::new(public_routes),
        }
    }

    pub fn context(&self) -> RouteContext {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn path(&self) -> String {
        self.context().path
    }

    pub fn set_path(&self, path: &str) {
        let context = RouteContext::parse(path, &self.public_routes);
        tracing::debug!("Location changed to {} (tenant: {})", context.path, context.tenant_slug());
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = context;
    }
}

/// Performs the navigation decided by the redirect policy
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &str);
}

/// Navigator that moves a [`Location`] and remembers every destination
#[derive(Debug)]
pub struct MemoryNavigator {
    location: Location,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Navigator for MemoryNavigator {
    fn navigate(&self, destination: &str) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(destination.to_string());
        self.location.set_path(destination);
    }
}
