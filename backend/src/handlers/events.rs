use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    hub::{EventNotice, HubError, NoticeKind},
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishNoticeRequest {
    pub kind: NoticeKind,
    #[serde(default)]
    pub data: Value,
}

/// Announces an event change to everyone connected to the event's group.
pub async fn publish_notice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(event_id): Path<String>,
    Json(payload): Json<PublishNoticeRequest>,
) -> Result<Json<Value>, AppError> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(HubError::EmptyEventId.into());
    }

    let delivered = state
        .hub
        .notify(EventNotice {
            kind: payload.kind,
            event_id: event_id.to_string(),
            data: payload.data,
        })
        .await;
    tracing::info!(user_id = %claims.sub, event_id, kind = ?payload.kind, delivered, "Event notice published");
    Ok(Json(json!({ "delivered": delivered })))
}
