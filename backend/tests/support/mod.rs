#![allow(dead_code)]
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use ticketing_backend::{
    config::Config,
    models::user::{User, UserRole},
    repositories::InMemoryUserRepository,
    router,
    state::AppState,
    utils::password::hash_password,
};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_ISSUER: &str = "ticketing-test";
pub const TEST_AUDIENCE: &str = "ticketing-test-client";

pub fn test_config() -> Config {
    Config {
        jwt_secret: Some(TEST_SECRET.to_string()),
        jwt_issuer: TEST_ISSUER.to_string(),
        jwt_audience: TEST_AUDIENCE.to_string(),
        access_token_ttl_minutes: 5,
        ..Config::default()
    }
}

pub fn test_state_with_config(config: Config) -> AppState {
    AppState::new(config, Arc::new(InMemoryUserRepository::new()))
}

pub fn test_state() -> AppState {
    test_state_with_config(test_config())
}

pub fn test_app(state: &AppState) -> Router {
    router(state.clone())
}

pub async fn seed_user(
    state: &AppState,
    email: &str,
    password: &str,
    role: UserRole,
    is_approved: bool,
) -> User {
    let user = User::new(
        email.to_string(),
        hash_password(password).expect("hash password"),
        "Seeded User".to_string(),
        role,
        is_approved,
    );
    state.auth.users().insert(&user).await.expect("insert user");
    user
}

pub fn access_token_for(state: &AppState, user: &User) -> String {
    state
        .auth
        .tokens()
        .issue_access_token(user)
        .expect("issue access token")
}

/// Signed with the right key but expired an hour ago.
pub fn expired_access_token_for(state: &AppState, user: &User) -> String {
    let tokens = state.auth.tokens();
    let mut claims = tokens.claims_for(user);
    claims.iat = (Utc::now() - Duration::hours(2)).timestamp();
    claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
    tokens.sign(&claims).expect("sign expired token")
}

/// Expired only a few seconds ago, well inside any default clock-skew leeway.
pub fn just_expired_access_token_for(state: &AppState, user: &User) -> String {
    let tokens = state.auth.tokens();
    let mut claims = tokens.claims_for(user);
    claims.exp = (Utc::now() - Duration::seconds(5)).timestamp();
    tokens.sign(&claims).expect("sign expired token")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };

    let response = app.clone().oneshot(request).await.expect("call app");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub async fn post_json(app: &Router, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, bearer, Some(body)).await
}
