//! Session-aware API client.
//!
//! # Design
//! Every call is the composition `apply_auth -> transport -> handle_errors`:
//!
//! - `apply_auth` reads the session synchronously at the moment the request
//!   is sent and sets `Authorization: Bearer <token>` when one exists.
//! - the `Transport` performs the round-trip and reports every status as
//!   data.
//! - `handle_errors` passes 2xx through. A 401 clears the session and asks
//!   the `Navigator` to return to login before the error is handed back, so
//!   no view keeps running on a token the server has rejected. Every other
//!   error status is returned untouched; retrying is the caller's decision.
//!
//! As in the rest of the crate, the pure halves of an operation (`build_*`
//! and `parse_*`) are public so they can be tested without a network.

use std::{fmt::Display, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::error::{detail_message, ApiError, LoginError, LOGIN_FALLBACK_MESSAGE};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::navigation::Navigator;
use crate::session::{SessionStore, User};
use crate::types::{
    tenant_hint, HealthStatus, LoginRequest, LoginResponse, MessageResponse, PasswordReset,
    PasswordResetRequest,
};

/// Shared client for all API traffic. Cheap to share behind an `Arc`.
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            session,
            navigator,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Resolve `path` against the API root.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    /// Send `request` through the full authenticated pipeline.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.apply_auth(&mut request);
        let method = request.method;
        let path = request.path.clone();
        let response = self.transport.execute(request).await?;
        debug!(method = method.as_str(), %path, status = response.status, "response received");
        self.handle_errors(response)
    }

    fn apply_auth(&self, request: &mut HttpRequest) {
        if let Some(token) = self.session.token() {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
    }

    fn handle_errors(&self, response: HttpResponse) -> Result<HttpResponse, ApiError> {
        if response.is_success() {
            return Ok(response);
        }
        match response.status {
            401 => {
                warn!("server rejected the session, returning to login");
                self.expire_session();
                Err(ApiError::Unauthorized {
                    body: response.body,
                })
            }
            404 => Err(ApiError::NotFound),
            status => Err(ApiError::HttpError {
                status,
                body: response.body,
            }),
        }
    }

    fn expire_session(&self) {
        self.session.clear();
        self.navigator.redirect_to_login();
    }

    // -----------------------------------------------------------------------
    // Generic resources
    // -----------------------------------------------------------------------

    pub fn build_list(&self, resource: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(resource))
    }

    pub fn build_fetch(&self, resource: &str, id: impl Display) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, self.url(&format!("{resource}/{id}")))
    }

    pub fn build_create<B: Serialize>(&self, resource: &str, body: &B) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest::new(HttpMethod::Post, self.url(resource)).with_json_body(encode(body)?))
    }

    pub fn build_update<B: Serialize>(
        &self,
        resource: &str,
        id: impl Display,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest::new(HttpMethod::Put, self.url(&format!("{resource}/{id}")))
            .with_json_body(encode(body)?))
    }

    pub fn build_remove(&self, resource: &str, id: impl Display) -> HttpRequest {
        HttpRequest::new(HttpMethod::Delete, self.url(&format!("{resource}/{id}")))
    }

    /// `GET /{resource}`
    pub async fn list<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>, ApiError> {
        decode(self.send(self.build_list(resource)).await?)
    }

    /// `GET /{resource}/{id}`
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &str,
        id: impl Display,
    ) -> Result<T, ApiError> {
        decode(self.send(self.build_fetch(resource, id)).await?)
    }

    /// `POST /{resource}`
    pub async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        decode(self.send(self.build_create(resource, body)?).await?)
    }

    /// `PUT /{resource}/{id}`
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        resource: &str,
        id: impl Display,
        body: &B,
    ) -> Result<T, ApiError> {
        decode(self.send(self.build_update(resource, id, body)?).await?)
    }

    /// `DELETE /{resource}/{id}`
    pub async fn remove(&self, resource: &str, id: impl Display) -> Result<(), ApiError> {
        self.send(self.build_remove(resource, id)).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Build the login request. The tenant hint is sent only when it is
    /// non-empty after trimming.
    pub fn build_login(
        &self,
        email: &str,
        password: &str,
        subdomain: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let payload = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            subdomain: tenant_hint(subdomain),
        };
        Ok(HttpRequest::new(HttpMethod::Post, self.url("auth/login")).with_json_body(encode(&payload)?))
    }

    /// Interpret the login response.
    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginResponse, LoginError> {
        if !response.is_success() {
            let message = detail_message(&response.body)
                .unwrap_or_else(|| LOGIN_FALLBACK_MESSAGE.to_string());
            return Err(LoginError::Rejected {
                status: response.status,
                message,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| LoginError::Persist(e.to_string()))
    }

    /// Authenticate and, on success, establish the session.
    ///
    /// A 401 here means the credentials were refused, not that a session
    /// expired, so it is reported to the caller and never triggers the
    /// return-to-login reset.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        subdomain: Option<&str>,
    ) -> Result<User, LoginError> {
        let mut request = self
            .build_login(email, password, subdomain)
            .map_err(|e| LoginError::Persist(e.to_string()))?;
        self.apply_auth(&mut request);

        let response = self.transport.execute(request).await.map_err(|e| {
            warn!(error = %e, "login request failed");
            LoginError::Transport(e.to_string())
        })?;

        let login = self.parse_login(response).inspect_err(|e| {
            info!(error = %e, "login rejected");
        })?;

        self.session
            .establish(login.access_token, login.user.clone())
            .map_err(|e| LoginError::Persist(e.to_string()))?;
        Ok(login.user)
    }

    /// End the session locally. No request is sent.
    pub fn logout(&self) {
        self.session.clear();
    }

    /// `POST /auth/forgot-password`
    pub async fn request_password_reset(
        &self,
        email: &str,
        subdomain: Option<&str>,
    ) -> Result<MessageResponse, ApiError> {
        let payload = PasswordResetRequest {
            email: email.to_string(),
            subdomain: tenant_hint(subdomain),
        };
        self.create("auth/forgot-password", &payload).await
    }

    /// `POST /auth/reset-password`
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let payload = PasswordReset {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        self.create("auth/reset-password", &payload).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        decode(self.send(HttpRequest::new(HttpMethod::Get, self.url("health"))).await?)
    }
}

fn encode<B: Serialize>(body: &B) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}
