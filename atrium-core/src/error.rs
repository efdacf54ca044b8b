//! Error types for Atrium operations

use serde_json::Value;
use thiserror::Error;

/// Body fields probed for a human-readable message, in priority order.
const MESSAGE_FIELDS: [&str; 4] = ["message", "error", "title", "detail"];

/// Errors surfaced by the API client.
///
/// `Status` is constructed only for non-2xx responses; success paths never
/// build one. The raw body is retained for diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: Option<String>,
    },

    /// Paginated discovery found no array anywhere in the response tree.
    #[error("no data found in response")]
    NoData,

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    /// Connection-level failure (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("bearer token must not be empty or blank")]
    InvalidToken,
}

impl ApiError {
    /// Build a structured error from a non-success response.
    ///
    /// The message is the first string field named `message`, `error`,
    /// `title`, or `detail` in a JSON body; if the body is absent, not JSON,
    /// or has none of those fields, the reason phrase is used instead.
    pub fn from_response(status: u16, reason: &str, body: Option<String>) -> Self {
        let message = body
            .as_deref()
            .and_then(extract_message)
            .unwrap_or_else(|| reason.to_string());
        ApiError::Status {
            status,
            message,
            body,
        }
    }

    /// Status code of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// True for statuses worth retrying: timeout, rate-limit, server error.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429) || status >= 500
}

fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let map = value.as_object()?;
    MESSAGE_FIELDS
        .iter()
        .find_map(|field| map.get(*field).and_then(Value::as_str).map(str::to_string))
}
