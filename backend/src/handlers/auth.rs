use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{
        ChangePasswordRequest, LoginRequest, LoginResponse, RefreshTokenRequest, RegisterRequest,
        TokenPair,
    },
    state::AppState,
    utils::jwt::Claims,
};

type HandlerResult<T> = Result<T, AppError>;

fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> HandlerResult<Json<Value>> {
    payload.validate()?;
    state
        .auth
        .register(
            &payload.email,
            &payload.password,
            &payload.full_name,
            &payload.role,
        )
        .await?;
    Ok(message(
        "Registration successful. Please wait for admin approval if you registered as Organizer.",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> HandlerResult<Json<LoginResponse>> {
    let response = state.auth.login(&payload.email, &payload.password).await?;
    Ok(Json(response))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> HandlerResult<Json<TokenPair>> {
    let pair = state
        .auth
        .refresh(&payload.access_token, &payload.refresh_token)
        .await?;
    Ok(Json(pair))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult<Json<Value>> {
    state.auth.logout(&claims.email).await?;
    Ok(message("Logged out successfully"))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> HandlerResult<Json<Value>> {
    payload.validate()?;
    // The token decides whose password changes; a body email may only confirm it.
    if let Some(email) = payload.email.as_deref().filter(|e| !e.is_empty()) {
        if email != claims.email {
            return Err(AppError::BadRequest(
                "Email does not match the authenticated user".to_string(),
            ));
        }
    }
    state
        .auth
        .change_password(&claims.email, &payload.old_password, &payload.new_password)
        .await?;
    Ok(message("Password changed successfully"))
}
