use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const APP_NAME: &str = "bizdesk";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub tenant_id: Option<String>,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub subdomain: String,
    pub company_name: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tenant_id: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub subdomain: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

#[derive(Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
    pub subdomain: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

#[derive(Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

#[derive(Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Error response carrying a `detail` message, as the real backend sends.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn new(status: StatusCode, detail: &str) -> Self {
        Self {
            status,
            detail: detail.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }

    fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not authenticated")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "detail": self.detail }))).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct Backend {
    tenants: Vec<Tenant>,
    accounts: Vec<Account>,
    /// bearer token -> user id
    tokens: HashMap<String, String>,
    /// reset token -> user id
    reset_tokens: HashMap<String, String>,
    customers: HashMap<Uuid, Customer>,
}

impl Backend {
    fn account_by_id(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.user.id == id)
    }

    fn tenant(&self, id: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|t| t.id == id)
    }
}

#[derive(Clone, Default)]
pub struct AppState {
    db: Arc<RwLock<Backend>>,
}

impl AppState {
    /// Two tenants (one suspended) and a handful of accounts:
    ///
    /// | email                | password   | tenant  |
    /// |----------------------|------------|---------|
    /// | admin@acme.test      | secret123  | acme    |
    /// | inactive@acme.test   | secret123  | acme    |
    /// | owner@dormant.test   | secret123  | dormant |
    /// | root@platform.test   | rootpass   | -       |
    pub fn seeded() -> Self {
        let tenants = vec![
            Tenant {
                id: "t-acme".to_string(),
                subdomain: "acme".to_string(),
                company_name: "Acme Ltda".to_string(),
                is_active: true,
            },
            Tenant {
                id: "t-dormant".to_string(),
                subdomain: "dormant".to_string(),
                company_name: "Dormant Co".to_string(),
                is_active: false,
            },
        ];
        let account = |id: &str, email: &str, name: &str, role: &str, tenant: Option<&str>, active: bool, password: &str| Account {
            user: User {
                id: id.to_string(),
                email: email.to_string(),
                name: name.to_string(),
                role: role.to_string(),
                tenant_id: tenant.map(str::to_string),
                is_active: active,
            },
            password: password.to_string(),
        };
        let accounts = vec![
            account("u-admin", "admin@acme.test", "Ana Souza", "admin", Some("t-acme"), true, "secret123"),
            account("u-inactive", "inactive@acme.test", "Ivo Lima", "operator", Some("t-acme"), false, "secret123"),
            account("u-owner", "owner@dormant.test", "Olga Reis", "admin", Some("t-dormant"), true, "secret123"),
            account("u-root", "root@platform.test", "Platform Root", "super_admin", None, true, "rootpass"),
        ];
        Self {
            db: Arc::new(RwLock::new(Backend {
                tenants,
                accounts,
                ..Backend::default()
            })),
        }
    }

    /// Invalidate every issued bearer token, as an expiry would.
    pub async fn revoke_tokens(&self) {
        self.db.write().await.tokens.clear();
    }

    /// The outstanding password reset token for `email`, if any.
    pub async fn reset_token_for(&self, email: &str) -> Option<String> {
        let db = self.db.read().await;
        let account = db.accounts.iter().find(|a| a.user.email == email)?;
        db.reset_tokens
            .iter()
            .find(|(_, user_id)| **user_id == account.user.id)
            .map(|(token, _)| token.clone())
    }
}

pub fn app() -> Router {
    app_with_state(AppState::seeded())
}

pub fn app_with_state(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        );
    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, AppState::seeded()).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "name": APP_NAME }))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut db = state.db.write().await;

    let tenant_id = match input.subdomain.as_deref().filter(|s| !s.is_empty()) {
        Some(subdomain) => {
            let tenant = db
                .tenants
                .iter()
                .find(|t| t.subdomain == subdomain)
                .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "Invalid subdomain"))?;
            Some(tenant.id.clone())
        }
        None => None,
    };

    let account = db
        .accounts
        .iter()
        .find(|a| a.user.email == input.email && a.user.tenant_id == tenant_id)
        .filter(|a| a.password == input.password)
        .ok_or_else(|| {
            info!(email = %input.email, "login refused");
            AppError::new(StatusCode::UNAUTHORIZED, "Incorrect email or password")
        })?;
    if !account.user.is_active {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "Inactive user"));
    }
    if let Some(tenant_id) = &account.user.tenant_id {
        if !db.tenant(tenant_id).is_some_and(|t| t.is_active) {
            return Err(AppError::new(StatusCode::FORBIDDEN, "Account suspended"));
        }
    }

    let user = account.user.clone();
    let token = Uuid::new_v4().simple().to_string();
    db.tokens.insert(token.clone(), user.id.clone());
    info!(email = %user.email, "login accepted");

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user,
    }))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordInput>,
) -> Json<Message> {
    let mut db = state.db.write().await;
    let tenant_id = input
        .subdomain
        .as_deref()
        .and_then(|s| db.tenants.iter().find(|t| t.subdomain == s))
        .map(|t| t.id.clone());
    let user_id = db
        .accounts
        .iter()
        .find(|a| a.user.email == input.email && (tenant_id.is_none() || a.user.tenant_id == tenant_id))
        .map(|a| a.user.id.clone());

    // The answer is the same whether or not the account exists.
    if let Some(user_id) = user_id {
        let token = Uuid::new_v4().simple().to_string();
        db.reset_tokens.retain(|_, id| *id != user_id);
        db.reset_tokens.insert(token, user_id);
        info!(email = %input.email, "password reset email queued");
    }
    Json(Message {
        message: "If the email exists, a reset link has been sent".to_string(),
    })
}

async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> Result<Json<Message>, AppError> {
    if input.new_password.chars().count() < 6 {
        return Err(AppError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Password must be at least 6 characters",
        ));
    }
    let mut db = state.db.write().await;
    let user_id = db
        .reset_tokens
        .remove(&input.token)
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "Invalid or expired token"))?;
    if let Some(account) = db.accounts.iter_mut().find(|a| a.user.id == user_id) {
        account.password = input.new_password;
    }
    Ok(Json(Message {
        message: "Password updated".to_string(),
    }))
}

/// Resolve the bearer token to the caller's active tenant id.
async fn current_tenant(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(AppError::unauthenticated)?;

    let db = state.db.read().await;
    let user = db
        .tokens
        .get(token)
        .and_then(|id| db.account_by_id(id))
        .map(|a| &a.user)
        .ok_or_else(AppError::unauthorized)?;
    if !user.is_active {
        return Err(AppError::new(StatusCode::BAD_REQUEST, "Inactive user"));
    }
    let tenant = user
        .tenant_id
        .as_deref()
        .and_then(|id| db.tenant(id))
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "User has no tenant"))?;
    if !tenant.is_active {
        return Err(AppError::new(StatusCode::FORBIDDEN, "Tenant suspended"));
    }
    Ok(tenant.id.clone())
}

async fn list_customers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Customer>>, AppError> {
    let tenant_id = current_tenant(&state, &headers).await?;
    let db = state.db.read().await;
    let mut customers: Vec<Customer> = db
        .customers
        .values()
        .filter(|c| c.tenant_id == tenant_id)
        .cloned()
        .collect();
    customers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(customers))
}

async fn create_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let tenant_id = current_tenant(&state, &headers).await?;
    let customer = Customer {
        id: Uuid::new_v4(),
        name: input.name,
        email: input.email,
        phone: input.phone,
        tenant_id,
    };
    state.db.write().await.customers.insert(customer.id, customer.clone());
    Ok((StatusCode::CREATED, Json(customer)))
}

fn not_found() -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "Customer not found")
}

async fn get_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let tenant_id = current_tenant(&state, &headers).await?;
    let db = state.db.read().await;
    db.customers
        .get(&id)
        .filter(|c| c.tenant_id == tenant_id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn update_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCustomer>,
) -> Result<Json<Customer>, AppError> {
    let tenant_id = current_tenant(&state, &headers).await?;
    let mut db = state.db.write().await;
    let customer = db
        .customers
        .get_mut(&id)
        .filter(|c| c.tenant_id == tenant_id)
        .ok_or_else(not_found)?;
    if let Some(name) = input.name {
        customer.name = name;
    }
    if input.email.is_some() {
        customer.email = input.email;
    }
    if input.phone.is_some() {
        customer.phone = input.phone;
    }
    Ok(Json(customer.clone()))
}

async fn delete_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let tenant_id = current_tenant(&state, &headers).await?;
    let mut db = state.db.write().await;
    match db.customers.get(&id) {
        Some(c) if c.tenant_id == tenant_id => {
            db.customers.remove(&id);
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(not_found()),
    }
}
