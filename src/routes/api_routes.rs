use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;
use crate::models::SendMessageRequest;
use crate::service::chat_service::ChatService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST `/api/chat`: run one message through the reliability layer
pub async fn send_message_handler(
    State(svc): State<ChatService>,
    Json(request): Json<SendMessageRequest>,
) -> Response {
    match svc.send_message(request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => error_response(&err),
    }
}

/// GET `/api/health`: cache, rate limiter and breaker counters
pub async fn health_handler(State(svc): State<ChatService>) -> impl IntoResponse {
    Json(svc.health_status())
}

// ── Helper ────────────────────────────────────────────────────────────────────

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AppError::EmptyField { .. } | AppError::FieldTooLong { .. } => StatusCode::BAD_REQUEST,
    }
}

fn error_response(err: &AppError) -> Response {
    if err.is_validation() {
        debug!("Rejected invalid request: {err}");
    }
    let retry_after_ms = match err {
        AppError::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
        _ => None,
    };
    let body = ErrorBody { error: err.to_string(), kind: err.kind(), retry_after_ms };
    (status_for(err), Json(body)).into_response()
}
