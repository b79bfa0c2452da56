//! Error types for the API client and the login flow.
//!
//! # Design
//! `Unauthorized` and `NotFound` get dedicated variants because callers act
//! on them differently from other failures: the former has already torn the
//! session down, the latter usually means "refresh the list". All other
//! non-2xx responses land in `HttpError` with the raw status and body.
//!
//! Login failures use their own type so the login boundary always hands back
//! a displayable message instead of a transport-specific error.

use thiserror::Error;

/// Message shown when a login failure carries no server-provided detail.
pub const LOGIN_FALLBACK_MESSAGE: &str = "Login failed";

/// Errors returned by `ApiClient` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the presented credential. The session has been
    /// cleared and a return to the login route requested before this is
    /// returned.
    #[error("session is no longer authorized")]
    Unauthorized { body: String },

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 401 and 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// No response was obtained (DNS, connect, TLS, timeout).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    /// HTTP status behind this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::NotFound => Some(404),
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The backend's human-readable `detail` message, if the error body has one.
    pub fn detail(&self) -> Option<String> {
        match self {
            ApiError::Unauthorized { body } | ApiError::HttpError { body, .. } => {
                detail_message(body)
            }
            _ => None,
        }
    }
}

/// Failure result of `ApiClient::login`.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The server answered with an error status.
    #[error("login rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The login request never produced a response.
    #[error("login transport failure: {0}")]
    Transport(String),

    /// The server accepted the credentials but the response or the durable
    /// session could not be handled.
    #[error("login could not be completed: {0}")]
    Persist(String),
}

impl LoginError {
    /// User-facing message for this failure.
    pub fn message(&self) -> &str {
        match self {
            LoginError::Rejected { message, .. } => message,
            LoginError::Transport(_) | LoginError::Persist(_) => LOGIN_FALLBACK_MESSAGE,
        }
    }
}

/// Extract a string `detail` field from a JSON error body.
///
/// Validation errors carry `detail` as an array of objects; those are not a
/// single displayable message and yield `None`.
pub(crate) fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|d| d.as_str())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
