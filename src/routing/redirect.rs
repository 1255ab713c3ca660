use std::sync::Arc;

use super::{Navigator, RouteContext};
use crate::session::SessionStore;

/// Outcome of an unrecoverable authentication failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Already on a login or other public route; navigating again would loop
    Stay,
    Navigate(String),
}

/// Decides where to send the user once the session cannot be recovered
#[derive(Clone)]
pub struct RedirectPolicy {
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl RedirectPolicy {
    pub fn new(session: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// Pure decision, no side effects
    pub fn decide(context: &RouteContext) -> RedirectDecision {
        if context.is_login_route() || context.is_public {
            return RedirectDecision::Stay;
        }
        RedirectDecision::Navigate(context.login_route())
    }

    /// Clear the session, then navigate if the decision says so.
    ///
    /// The session is cleared before navigating so anything reading it from the
    /// destination sees a logged-out state.
    pub fn apply(&self, context: &RouteContext) -> RedirectDecision {
        let decision = Self::decide(context);
        self.session.clear();

        match &decision {
            RedirectDecision::Navigate(destination) => {
                tracing::info!(
                    "Session ended, redirecting from {} to {}",
                    context.path,
                    destination
                );
                self.navigator.navigate(destination);
            }
            RedirectDecision::Stay => {
                tracing::debug!("Session ended on public route {}, not redirecting", context.path);
            }
        }

        decision
    }
}

impl std::fmt::Debug for RedirectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectPolicy").finish_non_exhaustive()
    }
}
