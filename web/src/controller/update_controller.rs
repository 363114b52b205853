use crate::controller::ApiResponse;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hub::UserId;
use log::*;
use serde_json::Value;

/// POST record the body as the user's latest update.
///
/// Open connections for the user receive it on the next dispatch tick. Only the
/// latest update per user is kept, so two posts within one tick deliver the second.
pub async fn create(
    State(app_state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let update = app_state.update_source.publish(user_id, payload);
    debug!(
        "Published update for user {} at {}",
        update.user_id, update.updated_at
    );

    (
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), update)),
    )
}
