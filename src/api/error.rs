//! API error types.

use std::fmt;
use thiserror::Error;

/// Extract a human-readable message from a JSON response body.
///
/// Handles common patterns:
/// - `{"msg": "..."}` (center API)
/// - `{"message": "..."}` (release index)
/// - `{"error": "..."}` or `{"error": {"message": "..."}}`
#[must_use]
pub fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    for key in ["msg", "message"] {
        if let Some(msg) = json.get(key).and_then(|v| v.as_str())
            && !msg.trim().is_empty()
        {
            return Some(msg.trim().to_string());
        }
    }

    let error_obj = json.get("error")?;
    if let Some(msg) = error_obj.as_str() {
        return Some(msg.trim().to_string());
    }
    error_obj
        .get("message")
        .and_then(|v| v.as_str())
        .map(|msg| msg.trim().to_string())
}

/// Status details of a failed API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiStatus {
    /// Request path relative to the client's base URL.
    pub path: String,
    /// HTTP status code.
    pub http_status: u16,
    /// Business code from the response envelope (0 when absent).
    pub code: i64,
    /// Message from the server, or the raw body text.
    pub message: String,
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "api {} failed: status={} code={} msg={}",
            self.path, self.http_status, self.code, self.message
        )
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request URL for {path}: {reason}")]
    InvalidUrl { path: String, reason: String },

    #[error("Failed to obtain access token: {0}")]
    Credentials(String),

    #[error("Request {method} {path} failed: {source}")]
    Transport {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request {path} timed out")]
    Timeout { path: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(ApiStatus),

    #[error("{0}")]
    Status(ApiStatus),

    #[error("Failed to decode response for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode request body for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Classify a transport failure, keeping timeouts distinct.
    pub(crate) fn transport(method: &reqwest::Method, path: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                path: path.to_string(),
            }
        } else {
            Self::Transport {
                method: method.to_string(),
                path: path.to_string(),
                source,
            }
        }
    }

    /// Whether the caller needs to log in again.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Status details for protocol-level failures.
    #[must_use]
    pub fn status(&self) -> Option<&ApiStatus> {
        match self {
            Self::Unauthorized(status) | Self::Status(status) => Some(status),
            _ => None,
        }
    }
}
