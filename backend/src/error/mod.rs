use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{hub::HubError, services::AuthError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
    /// Session manager failures keep their own status and machine-readable code.
    Auth(AuthError),
    Hub(HubError),
}

fn auth_status(err: &AuthError) -> (StatusCode, &'static str) {
    match err {
        AuthError::DuplicateEmail => (StatusCode::BAD_REQUEST, "DUPLICATE_EMAIL"),
        AuthError::UnauthorizedRole => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED_ROLE"),
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
        AuthError::PendingApproval => (StatusCode::UNAUTHORIZED, "PENDING_APPROVAL"),
        AuthError::InvalidToken => (StatusCode::BAD_REQUEST, "INVALID_TOKEN"),
        AuthError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        AuthError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        AuthError::MissingSigningKey => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST", None),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR",
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR",
                Some(serde_json::json!({ "errors": errors })),
            ),
            AppError::Auth(AuthError::Internal(err)) => {
                return AppError::InternalServerError(err).into_response()
            }
            AppError::Auth(err) => {
                let (status, code) = auth_status(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "Session manager misconfigured");
                }
                (status, err.to_string(), code, None)
            }
            AppError::Hub(err) => (
                StatusCode::BAD_REQUEST,
                err.to_string(),
                "INVALID_ARGUMENT",
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<HubError> for AppError {
    fn from(err: HubError) -> Self {
        AppError::Hub(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter()
                    .map(move |e| format!("{}: {}", field, e.code.as_ref()))
            })
            .collect();
        messages.sort();
        AppError::Validation(messages)
    }
}
