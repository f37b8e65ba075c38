//! HTTP request handlers

use super::types::{AckResponse, ErrorResponse};
use super::AppState;
use crate::telegram::TgUpdate;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/:secret", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Accept one update. The turn runs after the response is sent, so a slow
/// turn never makes the transport redeliver.
async fn webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    body: Bytes,
) -> Result<Json<AckResponse>, AppError> {
    if state.webhook_secret.as_deref() != Some(secret.as_str()) {
        tracing::warn!("Webhook called with an unknown secret");
        return Err(AppError::NotFound("not found".to_string()));
    }

    let update: TgUpdate =
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid update: {e}")))?;
    let update = update.into_update();
    tracing::debug!(update_id = update.update_id, "Webhook update received");
    state.dispatcher.dispatch(update).await;

    Ok(Json(AckResponse { ok: true }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
