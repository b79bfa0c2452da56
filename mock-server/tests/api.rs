use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with_state, AppState, Customer, TokenResponse};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<&str>) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    if body.is_some() {
        builder = builder.header(http::header::CONTENT_TYPE, "application/json");
    }
    builder.body(body.unwrap_or_default().to_string()).unwrap()
}

async fn login(app: &Router, body: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request("POST", "/api/auth/login", body))
        .await
        .unwrap()
}

async fn admin_token(app: &Router) -> String {
    let resp = login(
        app,
        r#"{"email":"admin@acme.test","password":"secret123","subdomain":"acme"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = body_json(resp).await;
    token.access_token
}

// --- health ---

#[tokio::test]
async fn health_is_served_at_root_and_under_api() {
    for uri in ["/health", "/api/health"] {
        let resp = app()
            .oneshot(Request::builder().uri(uri).body(String::new()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = body_json(resp).await;
        assert_eq!(body["status"], "ok");
    }
}

// --- login ---

#[tokio::test]
async fn login_with_tenant_returns_token_and_user() {
    let app = app();
    let resp = login(
        &app,
        r#"{"email":"admin@acme.test","password":"secret123","subdomain":"acme"}"#,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = body_json(resp).await;
    assert_eq!(token.token_type, "bearer");
    assert!(!token.access_token.is_empty());
    assert_eq!(token.user.email, "admin@acme.test");
    assert_eq!(token.user.tenant_id.as_deref(), Some("t-acme"));
}

#[tokio::test]
async fn tenant_user_needs_subdomain() {
    let resp = login(&app(), r#"{"email":"admin@acme.test","password":"secret123"}"#).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn platform_user_logs_in_without_subdomain() {
    let resp = login(&app(), r#"{"email":"root@platform.test","password":"rootpass"}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = body_json(resp).await;
    assert_eq!(token.user.role, "super_admin");
    assert!(token.user.tenant_id.is_none());
}

#[tokio::test]
async fn wrong_password_returns_401_with_detail() {
    let resp = login(
        &app(),
        r#"{"email":"admin@acme.test","password":"nope","subdomain":"acme"}"#,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[http::header::WWW_AUTHENTICATE], "Bearer");
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Incorrect email or password");
}

#[tokio::test]
async fn unknown_subdomain_returns_400() {
    let resp = login(
        &app(),
        r#"{"email":"admin@acme.test","password":"secret123","subdomain":"nowhere"}"#,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Invalid subdomain");
}

#[tokio::test]
async fn inactive_user_returns_400() {
    let resp = login(
        &app(),
        r#"{"email":"inactive@acme.test","password":"secret123","subdomain":"acme"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suspended_tenant_returns_403() {
    let resp = login(
        &app(),
        r#"{"email":"owner@dormant.test","password":"secret123","subdomain":"dormant"}"#,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Account suspended");
}

#[tokio::test]
async fn malformed_login_body_is_rejected() {
    let resp = login(&app(), r#"{"email":"admin@acme.test"}"#).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- password reset ---

#[tokio::test]
async fn password_reset_flow() {
    let state = AppState::seeded();
    let app = app_with_state(state.clone());

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/forgot-password",
            r#"{"email":"admin@acme.test","subdomain":"acme"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let reset = state.reset_token_for("admin@acme.test").await.unwrap();

    let resp = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/reset-password",
            &format!(r#"{{"token":"{reset}","new_password":"brand-new"}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = login(
        &app,
        r#"{"email":"admin@acme.test","password":"brand-new","subdomain":"acme"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Tokens are single use.
    let resp = app
        .oneshot(json_request(
            "POST",
            "/api/auth/reset-password",
            &format!(r#"{{"token":"{reset}","new_password":"another1"}}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forgot_password_does_not_reveal_unknown_email() {
    let state = AppState::seeded();
    let resp = app_with_state(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/auth/forgot-password",
            r#"{"email":"ghost@acme.test"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(state.reset_token_for("ghost@acme.test").await.is_none());
}

#[tokio::test]
async fn short_new_password_returns_422() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/auth/reset-password",
            r#"{"token":"whatever","new_password":"abc"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- customers: authorization ---

#[tokio::test]
async fn customers_without_token_returns_401() {
    let resp = app()
        .oneshot(Request::builder().uri("/api/customers").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Not authenticated");
}

#[tokio::test]
async fn revoked_token_returns_401() {
    let state = AppState::seeded();
    let app = app_with_state(state.clone());
    let token = admin_token(&app).await;

    state.revoke_tokens().await;

    let resp = app.oneshot(authed("GET", "/api/customers", &token, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = body_json(resp).await;
    assert_eq!(body["detail"], "Could not validate credentials");
}

#[tokio::test]
async fn platform_user_has_no_tenant_resources() {
    let app = app();
    let resp = login(&app, r#"{"email":"root@platform.test","password":"rootpass"}"#).await;
    let token: TokenResponse = body_json(resp).await;

    let resp = app
        .oneshot(authed("GET", "/api/customers", &token.access_token, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_customer_bad_uuid_returns_400() {
    let app = app();
    let token = admin_token(&app).await;
    let resp = app
        .oneshot(authed("GET", "/api/customers/not-a-uuid", &token, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- customers: full CRUD lifecycle ---

#[tokio::test]
async fn customer_crud_lifecycle() {
    let app = app();
    let token = admin_token(&app).await;

    // create
    let resp = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/customers",
            &token,
            Some(r#"{"name":"Bia Costa","phone":"+55 11 99999-0000"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Customer = body_json(resp).await;
    assert_eq!(created.name, "Bia Costa");
    assert_eq!(created.tenant_id, "t-acme");
    let id = created.id;

    // list
    let resp = app
        .clone()
        .oneshot(authed("GET", "/api/customers", &token, None))
        .await
        .unwrap();
    let customers: Vec<Customer> = body_json(resp).await;
    assert_eq!(customers, vec![created.clone()]);

    // update, partial: only email
    let resp = app
        .clone()
        .oneshot(authed(
            "PUT",
            &format!("/api/customers/{id}"),
            &token,
            Some(r#"{"email":"bia@example.com"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Customer = body_json(resp).await;
    assert_eq!(updated.name, "Bia Costa"); // unchanged
    assert_eq!(updated.email.as_deref(), Some("bia@example.com"));

    // delete
    let resp = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/customers/{id}"), &token, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete: 404
    let resp = app
        .oneshot(authed("GET", &format!("/api/customers/{id}"), &token, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
