//! Typed failures for calls to the messaging API.

use reqwest::StatusCode;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use tracing::debug;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";

#[derive(Debug, Clone)]
pub enum ApiError {
    /// The server answered with a non-success status.
    Http {
        status: StatusCode,
        message: String,
        body: Value,
    },
    /// No response was obtained: DNS, connection, or timeout failure.
    Network { message: String },
    /// The server answered 2xx but reported `success: false`, or the call
    /// could not be made with the local state available.
    Rejected { message: String, body: Value },
    /// The server answered 2xx with a body of the wrong shape.
    Decode { status: StatusCode, message: String },
}

impl ApiError {
    pub fn network() -> Self {
        ApiError::Network {
            message: NETWORK_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ApiError::Rejected {
            message: message.into(),
            body: Value::Null,
        }
    }

    /// Build the error for a non-success response, preferring a
    /// server-supplied `message` or `error` field.
    pub fn from_status(status: StatusCode, body: Value) -> Self {
        let message = server_message(&body)
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
        ApiError::Http {
            status,
            message,
            body,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Http { message, .. }
            | ApiError::Network { message }
            | ApiError::Rejected { message, .. }
            | ApiError::Decode { message, .. } => message,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status, .. } | ApiError::Decode { status, .. } => Some(*status),
            ApiError::Network { .. } | ApiError::Rejected { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Http { body, .. } | ApiError::Rejected { body, .. } if !body.is_null() => {
                Some(body)
            }
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }

    /// True when the server refused a login because the account's email has
    /// not been verified yet.
    pub fn requires_verification(&self) -> bool {
        self.body()
            .and_then(|body| body.get("requires_verification"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The email the server associated with a verification-required refusal.
    pub fn verification_email(&self) -> Option<String> {
        self.body()
            .and_then(|body| body.get("email"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Extract the human-readable message a response body carries, if any.
pub fn server_message(body: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .filter_map(|field| body.get(*field))
        .filter_map(Value::as_str)
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl StdError for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        debug!(error = %err, timeout = err.is_timeout(), "request produced no response");
        ApiError::network()
    }
}
