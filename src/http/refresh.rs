//! Single-flight session refresh.
//!
//! The coordinator is either **Idle** (no ticket) or **Refreshing** (one
//! [`RefreshTicket`] in the slot). The first caller that finds the slot empty
//! spawns the refresh call and stores its shared handle before releasing the
//! lock, so every caller that arrives while the call is outstanding clones the
//! same handle instead of issuing its own. The refresh task settles the ticket
//! exactly once: on success it updates the session, on failure it runs the
//! redirect policy, and in both cases it empties the slot so a later 401 can
//! start a fresh refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::headers::HeaderBuilder;
use super::interceptor::capture_csrf_token;
use crate::config::TokenMode;
use crate::routing::{Location, RedirectPolicy};
use crate::session::{access_token_from_auth_body, Session, SessionStore};

/// What every caller attached to a ticket observes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Session renewed, the original request may be retried once
    Refreshed,
    /// Session is gone; carries the reason for logging and error messages
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed)
    }
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// The in-flight refresh, shared by reference with every waiter
struct RefreshTicket {
    id: u64,
    outcome: SharedRefresh,
}

struct CoordinatorInner {
    http: Client,
    refresh_url: Url,
    timeout: Duration,
    token_mode: TokenMode,
    session: Arc<SessionStore>,
    headers: HeaderBuilder,
    location: Location,
    redirect: RedirectPolicy,
    ticket: Mutex<Option<RefreshTicket>>,
    next_ticket: AtomicU64,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Client,
        refresh_url: Url,
        timeout: Duration,
        token_mode: TokenMode,
        session: Arc<SessionStore>,
        headers: HeaderBuilder,
        location: Location,
        redirect: RedirectPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                http,
                refresh_url,
                timeout,
                token_mode,
                session,
                headers,
                location,
                redirect,
                ticket: Mutex::new(None),
                next_ticket: AtomicU64::new(1),
            }),
        }
    }

    /// True while a refresh call is outstanding
    pub fn is_refreshing(&self) -> bool {
        self.inner.slot().is_some()
    }

    /// Wait for a session refresh, starting one only if none is in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        let outcome = {
            let mut slot = self.inner.slot();
            match slot.as_ref() {
                Some(ticket) => {
                    tracing::debug!("Refresh #{} already in flight, waiting on it", ticket.id);
                    ticket.outcome.clone()
                }
                None => {
                    let id = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                    tracing::info!("Session expired, starting refresh #{}", id);

                    let task = tokio::spawn(self.inner.clone().settle(id));
                    let inner = self.inner.clone();
                    let outcome = async move {
                        task.await.unwrap_or_else(|e| {
                            // settle died before emptying the slot
                            inner.release(id);
                            RefreshOutcome::Failed(format!("refresh task aborted: {}", e))
                        })
                    }
                    .boxed()
                    .shared();

                    *slot = Some(RefreshTicket {
                        id,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await
    }
}

impl CoordinatorInner {
    fn slot(&self) -> std::sync::MutexGuard<'_, Option<RefreshTicket>> {
        self.ticket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Empty the slot if it still holds ticket `id`
    fn release(&self, id: u64) {
        let mut slot = self.slot();
        if slot.as_ref().map(|t| t.id) == Some(id) {
            *slot = None;
        }
    }

    /// Runs the refresh call and applies its consequences exactly once per ticket.
    ///
    /// The call runs in its own task so a panic while handling the response
    /// settles the ticket as a failure instead of leaving it in the slot.
    async fn settle(self: Arc<Self>, id: u64) -> RefreshOutcome {
        let inner = self.clone();
        let mut call = tokio::spawn(async move { inner.call_refresh().await });

        let outcome = match tokio::time::timeout(self.timeout, &mut call).await {
            Ok(Ok(Ok(()))) => RefreshOutcome::Refreshed,
            Ok(Ok(Err(reason))) => RefreshOutcome::Failed(reason),
            Ok(Err(e)) => RefreshOutcome::Failed(format!("refresh call aborted: {}", e)),
            Err(_) => {
                call.abort();
                RefreshOutcome::Failed(format!(
                    "refresh did not complete within {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        // Empty the slot before waiters resume so a 401 seen after this point
        // starts a new ticket instead of reusing a settled one
        self.release(id);

        match &outcome {
            RefreshOutcome::Refreshed => {
                tracing::info!("Refresh #{} succeeded, retrying waiting requests", id);
            }
            RefreshOutcome::Failed(reason) => {
                tracing::warn!("Refresh #{} failed: {}", id, reason);
                self.redirect.apply(&self.location.context());
            }
        }

        outcome
    }

    async fn call_refresh(&self) -> Result<(), String> {
        let context = self.location.context();
        let response = self
            .http
            .post(self.refresh_url.clone())
            .headers(self.headers.build(&context))
            .send()
            .await
            .map_err(|e| format!("refresh request failed: {}", e))?;

        capture_csrf_token(&self.session, &response);

        let status = response.status();
        if !status.is_success() {
            return Err(format!("refresh endpoint answered {}", status));
        }

        // The body is optional; an unreadable one still counts as a successful refresh
        let body = match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice::<Value>(&bytes).ok(),
            _ => None,
        };

        if let Some(body) = body {
            if let Some(session) = Session::from_auth_body(&body) {
                self.session.set(session);
            }
            if self.token_mode == TokenMode::Bearer {
                if let Some(token) = access_token_from_auth_body(&body) {
                    self.session.set_access_token(token);
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.inner.refresh_url.as_str())
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}
