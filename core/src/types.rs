//! Wire DTOs for the authentication and health endpoints.
//!
//! Field names match the backend's snake_case JSON.

use serde::{Deserialize, Serialize};

use crate::session::User;

/// Request payload for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Tenant hint. Omitted from the JSON entirely when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// Successful response from `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: User,
}

/// Request payload for `POST /auth/forgot-password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// Request payload for `POST /auth/reset-password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// Response from `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Normalize an optional tenant hint: trimmed, and dropped when empty.
pub(crate) fn tenant_hint(subdomain: Option<&str>) -> Option<String> {
    subdomain
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
