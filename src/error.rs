// Client Error Types
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the request layer to its callers
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure, no response received
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The session could not be recovered by a refresh
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Non-success status, or a body that did not match its declared type
    #[error("API error {status}: {message}")]
    Api {
        status: StatusCode,
        status_text: String,
        message: String,
        body: Option<Value>,
    },

    /// Request could not be built (bad URL, header value or JSON payload)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn session_expired(message: impl Into<String>) -> Self {
        ClientError::SessionExpired(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ClientError::InvalidRequest(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        ClientError::Config(message.into())
    }

    /// Build an API error from a status and an optional decoded body.
    ///
    /// The message is taken from the backend's `message` or `error` field when
    /// present, otherwise it falls back to the status text.
    pub fn api(status: StatusCode, body: Option<Value>) -> Self {
        let status_text = status_text(status);
        let message = body
            .as_ref()
            .and_then(|b| {
                b.get("message")
                    .or_else(|| b.get("error"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
            .unwrap_or_else(|| status_text.clone());

        ClientError::Api {
            status,
            status_text,
            message,
            body,
        }
    }

    /// A response whose body could not be decoded as its declared type
    pub fn malformed_body(status: StatusCode) -> Self {
        let status_text = status_text(status);
        ClientError::Api {
            status,
            message: format!("Malformed response body ({} {})", status.as_u16(), status_text),
            status_text,
            body: None,
        }
    }

    /// HTTP status carried by the error, when one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::SessionExpired(_) => Some(StatusCode::UNAUTHORIZED),
            ClientError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Error code for callers that render failures
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::SessionExpired(_) => "SESSION_EXPIRED",
            ClientError::Api { status, .. } => match status.as_u16() {
                400 => "BAD_REQUEST",
                401 => "UNAUTHORIZED",
                403 => "FORBIDDEN",
                404 => "NOT_FOUND",
                409 => "CONFLICT",
                422 => "UNPROCESSABLE_ENTITY",
                429 => "TOO_MANY_REQUESTS",
                s if s >= 500 => "SERVER_ERROR",
                _ => "API_ERROR",
            },
            ClientError::InvalidRequest(_) => "INVALID_REQUEST",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_prefers_backend_message() {
        let err = ClientError::api(
            StatusCode::CONFLICT,
            Some(json!({ "error": true, "message": "Template already exists" })),
        );
        match &err {
            ClientError::Api { message, status_text, .. } => {
                assert_eq!(message, "Template already exists");
                assert_eq!(status_text, "Conflict");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_api_error_without_body_uses_status_text() {
        let err = ClientError::api(StatusCode::BAD_GATEWAY, None);
        assert_eq!(err.to_string(), "API error 502 Bad Gateway: Bad Gateway");
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(err.error_code(), "SERVER_ERROR");
    }
}
