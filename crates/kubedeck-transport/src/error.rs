use std::time::Duration;

use kubedeck_types::StatusBody;
use thiserror::Error;

/// Every way a request can fail
///
/// The message of each variant is meant to be shown to a user as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    /// DNS, connection refused, TLS, or a body that could not be read off the wire
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        status_body: Option<StatusBody>,
    },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A text response, such as container logs, that is not valid UTF-8
    #[error("response body is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("failed to encode request: {0}")]
    Encode(String),

    /// A request descriptor did not match its operation's required shape
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Build an HTTP error from a response body
    ///
    /// The message comes from `{"error": ...}`, then from a `Status` body's
    /// `message`, then falls back to a generic text with the status code.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_slice(body).ok();

        let status_body = parsed
            .as_ref()
            .filter(|value| {
                value.get("kind").and_then(|k| k.as_str()) == Some("Status")
                    || value.get("code").is_some()
            })
            .and_then(|value| serde_json::from_value::<StatusBody>(value.clone()).ok());

        let message = parsed
            .as_ref()
            .and_then(|value| value.get("error"))
            .and_then(|error| error.as_str())
            .map(str::to_string)
            .or_else(|| status_body.as_ref().and_then(|s| s.message.clone()))
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP error! status: {}", status));

        ApiError::Http {
            status,
            message,
            status_body,
        }
    }

    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether no response was received at all
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }

    /// `reason` of a structured `Status` body, e.g. `AlreadyExists`
    pub fn reason(&self) -> Option<&str> {
        match self {
            ApiError::Http {
                status_body: Some(body),
                ..
            } => body.reason.as_deref(),
            _ => None,
        }
    }
}
