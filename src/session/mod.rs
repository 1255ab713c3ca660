use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Authenticated-user marker. The request layer only cares whether one is
/// present; the user snapshot is kept for callers that display it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Value,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user: Value) -> Self {
        Self {
            user,
            expires_at: None,
        }
    }

    /// Read a session out of a login or refresh response body.
    ///
    /// Accepts `{ "user": {...}, "expiresAt": "<rfc3339>" }` or
    /// `{ "user": {...}, "expiresIn": <seconds> }`, optionally wrapped in a
    /// `{ "success": true, "data": {...} }` envelope. Returns `None` when the
    /// body carries no user.
    pub fn from_auth_body(body: &Value) -> Option<Self> {
        let body = unwrap_envelope(body);
        let user = body.get("user").filter(|u| !u.is_null())?.clone();

        let expires_at = body
            .get("expiresAt")
            .or_else(|| body.get("expires_at"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                body.get("expiresIn")
                    .or_else(|| body.get("expires_in"))
                    .and_then(Value::as_i64)
                    .and_then(Duration::try_seconds)
                    .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            });

        Some(Self { user, expires_at })
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

/// Access token from a login or refresh body (bearer deployments only)
pub fn access_token_from_auth_body(body: &Value) -> Option<String> {
    let body = unwrap_envelope(body);
    body.get("accessToken")
        .or_else(|| body.get("access_token"))
        .or_else(|| body.get("token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn unwrap_envelope(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if body.get("success").is_some() && data.is_object() => data,
        _ => body,
    }
}

/// Everything the store holds, used to persist and restore between processes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub csrf_token: Option<String>,
    pub access_token: Option<String>,
}

/// Current session, last observed anti-forgery token and (bearer mode) the
/// access token. No business logic and no side effects beyond its own state.
///
/// `clear` ends the session but keeps the anti-forgery token: the token lives
/// as long as the client, the session only as long as the login.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: Mutex<SessionSnapshot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    pub fn set(&self, session: Session) {
        self.lock().session = Some(session);
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.session = None;
        state.access_token = None;
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.lock().csrf_token.clone()
    }

    /// Replace the anti-forgery token; returns true when the value changed
    pub fn set_csrf_token(&self, token: impl Into<String>) -> bool {
        let token = token.into();
        let mut state = self.lock();
        if state.csrf_token.as_deref() == Some(token.as_str()) {
            return false;
        }
        state.csrf_token = Some(token);
        true
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.lock().access_token = Some(token.into());
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionSnapshot> {
        // State is plain data, a panic mid-update cannot leave it inconsistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clear_keeps_csrf_token() {
        let store = SessionStore::new();
        store.set(Session::new(json!({ "id": "u1" })));
        store.set_csrf_token("abc");
        store.set_access_token("tok");

        store.clear();

        assert!(store.get().is_none());
        assert!(store.access_token().is_none());
        assert_eq!(store.csrf_token().as_deref(), Some("abc"));
    }

    #[test]
    fn test_csrf_token_last_write_wins() {
        let store = SessionStore::new();
        assert!(store.set_csrf_token("first"));
        assert!(!store.set_csrf_token("first"));
        assert!(store.set_csrf_token("second"));
        assert_eq!(store.csrf_token().as_deref(), Some("second"));
    }

    #[test]
    fn test_session_from_refresh_body() {
        let body = json!({
            "user": { "id": "u1", "email": "ops@example.com" },
            "expiresAt": "2030-01-01T00:00:00Z"
        });
        let session = Session::from_auth_body(&body).expect("session");
        assert_eq!(session.user["id"], "u1");
        assert_eq!(
            session.expires_at.map(|dt| dt.to_rfc3339()),
            Some("2030-01-01T00:00:00+00:00".to_string())
        );
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_from_enveloped_body() {
        let body = json!({
            "success": true,
            "data": { "user": { "id": "u2" }, "expiresIn": 3600, "accessToken": "jwt" }
        });
        let session = Session::from_auth_body(&body).expect("session");
        assert_eq!(session.user["id"], "u2");
        assert!(session.expires_at.is_some());
        assert_eq!(access_token_from_auth_body(&body).as_deref(), Some("jwt"));
    }

    #[test]
    fn test_out_of_range_expiry_is_dropped() {
        let body = json!({ "user": { "id": "u3" }, "expiresIn": 9_999_999_999_999_999i64 });
        let session = Session::from_auth_body(&body).expect("session");
        assert_eq!(session.user["id"], "u3");
        assert!(session.expires_at.is_none());

        let body = json!({ "user": { "id": "u3" }, "expiresIn": i64::MAX });
        assert!(Session::from_auth_body(&body).expect("session").expires_at.is_none());
    }

    #[test]
    fn test_body_without_user_has_no_session() {
        assert!(Session::from_auth_body(&json!({ "expiresIn": 900 })).is_none());
        assert!(Session::from_auth_body(&json!({ "user": null })).is_none());
        assert!(access_token_from_auth_body(&json!({ "accessToken": "" })).is_none());
    }
}
