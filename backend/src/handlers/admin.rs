use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{CreateUserRequest, UserResponse},
    state::AppState,
    types::UserId,
    utils::jwt::Claims,
};

pub async fn approve_organizer(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>, AppError> {
    state.auth.approve_organizer(id).await?;
    Ok(Json(json!({ "message": "Organizer approved successfully." })))
}

pub async fn pending_organizers(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let pending = state.auth.list_pending_organizers().await?;
    Ok(Json(pending.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;
    let user = state
        .auth
        .create_user(
            &payload.email,
            &payload.password,
            &payload.full_name,
            &payload.role,
        )
        .await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>, AppError> {
    state.auth.delete_user(claims.sub, id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
