use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use crate::{
    models::user::UserRole,
    state::AppState,
    utils::jwt::{Claims, TokenError, TokenIssuer},
};

pub async fn auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(request.headers());
    authorize(state.auth.tokens(), token.as_deref(), request, next, |_| true).await
}

// Auth + require admin role for admin-only routes
pub async fn auth_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(request.headers());
    authorize(state.auth.tokens(), token.as_deref(), request, next, |role| {
        role == UserRole::Admin
    })
    .await
}

// Auth + require a role allowed to push event notices
pub async fn auth_publisher(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(request.headers());
    authorize(
        state.auth.tokens(),
        token.as_deref(),
        request,
        next,
        |role| role.can_publish_event_notices(),
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct HubConnectQuery {
    pub access_token: Option<String>,
}

/// Connect-time authentication for the event hub. Browsers cannot set headers
/// on a WebSocket handshake, so the token travels as `?access_token=`; an
/// `Authorization` header is honoured as a fallback.
pub async fn auth_hub(
    State(state): State<AppState>,
    Query(query): Query<HubConnectQuery>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = query
        .access_token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(request.headers()));
    authorize(state.auth.tokens(), token.as_deref(), request, next, |_| true).await
}

async fn authorize(
    tokens: &TokenIssuer,
    token: Option<&str>,
    mut request: Request,
    next: Next,
    allowed: impl Fn(UserRole) -> bool,
) -> Result<Response, StatusCode> {
    let claims = verify(tokens, token)?;
    if !allowed(claims.role) {
        tracing::warn!(user_id = %claims.sub, role = %claims.role, "Role not permitted for route");
        return Err(StatusCode::FORBIDDEN);
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn verify(tokens: &TokenIssuer, token: Option<&str>) -> Result<Claims, StatusCode> {
    let token = token.ok_or(StatusCode::UNAUTHORIZED)?;
    tokens.verify_access_token(token).map_err(|err| match err {
        TokenError::MissingSigningKey => {
            tracing::error!("JWT signing key is not configured");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        TokenError::Invalid(e) => {
            tracing::debug!(error = %e, "Rejected access token");
            StatusCode::UNAUTHORIZED
        }
    })
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .map(str::to_owned)
}
