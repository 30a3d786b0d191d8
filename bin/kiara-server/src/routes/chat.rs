//! Chat routes: ask the model and read back the chat log.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ValidatedJson;
use crate::schemas::chat::{
    AskRequest, AskResponse, ChatLogEntry, ChatMessage, ErrorResponse, LogsResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(ask, list_logs),
    components(schemas(
        AskRequest,
        AskResponse,
        ChatMessage,
        ChatLogEntry,
        LogsResponse,
        ErrorResponse
    ))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ask", post(ask))
        .route("/logs", get(list_logs))
}

/// Ask the model a question (`POST /api/v1/ask`).
///
/// The raw completion is cleaned of template markup before it is returned
/// and written to the chat log.  A failed log write does not fail the
/// request; `logged` is `false` instead.
#[utoipa::path(
    post,
    path = "/api/v1/ask",
    tag = "chat",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Answer generated", body = AskResponse),
        (status = 401, description = "Missing or wrong internal token", body = ErrorResponse),
        (status = 422, description = "Invalid request body", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse),
    )
)]
pub async fn ask(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<AskRequest>,
) -> Result<Json<AskResponse>, ServerError> {
    req.check_limits(state.config.max_message_bytes)
        .map_err(|errors| ServerError::validation(json!(errors), state.config.production))?;

    debug!(message_len = req.message.len(), "ask request");
    let reply = state.chat.ask(&req.message).await?;
    Ok(Json(AskResponse::from(reply)))
}

/// Every recorded exchange, oldest first (`GET /api/v1/logs`).
#[utoipa::path(
    get,
    path = "/api/v1/logs",
    tag = "chat",
    responses(
        (status = 200, description = "Chat log", body = LogsResponse),
        (status = 401, description = "Missing or wrong internal token", body = ErrorResponse),
        (status = 500, description = "Chat log unavailable", body = ErrorResponse),
    )
)]
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LogsResponse>, ServerError> {
    let exchanges = state.chat.history().await?;
    Ok(Json(LogsResponse::new(exchanges)))
}
