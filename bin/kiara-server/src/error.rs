//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are converted to the JSON
//! error envelope with an appropriate status code.
//!
//! **Security note:** generation and storage failures are logged with full
//! detail but only a generic message is returned, so prompts, SQL and runtime
//! addresses never reach clients.

use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kiara_core::{ChatError, StoreError};
use thiserror::Error;
use tracing::error;

use crate::schemas::chat::ErrorResponse;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The model did not produce an answer.
    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    /// The chat log could not be read.
    #[error("chat log error: {0}")]
    Store(#[from] StoreError),

    /// The request body was malformed or failed validation.  `details` is
    /// `None` in production.
    #[error("validation failed")]
    Validation { details: Option<serde_json::Value> },

    /// Missing or wrong shared secret.
    #[error("unauthorized request origin")]
    Unauthorized,

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Validation failure whose field details are exposed only outside
    /// production.
    pub fn validation(details: serde_json::Value, production: bool) -> Self {
        ServerError::Validation {
            details: (!production).then_some(details),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ServerError::Validation { details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Unprocessable Entity",
                details,
            ),
            ServerError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Unauthorized request origin", None)
            }

            // Internal errors: log the full detail, return a generic message.
            ServerError::Chat(e) => {
                error!(error = %e, "chat request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Unhandled Exception", None)
            }
            ServerError::Store(e) => {
                error!(error = %e, "chat log error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Unhandled Exception", None)
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Unhandled Exception", None)
            }
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            message: message.to_owned(),
            data: Vec::new(),
            details,
            error: true,
        };
        (status, Json(body)).into_response()
    }
}

/// Converts a handler panic into the generic 500 envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "unknown panic payload".to_owned()
    };
    ServerError::Internal(format!("handler panicked: {detail}")).into_response()
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use kiara_core::GenerationError;
    use serde_json::{Value, json};

    async fn body_of(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn generation_failure_is_500_without_detail() {
        let err = ServerError::Chat(ChatError::Generation(GenerationError::Status {
            status: 503,
            body: "model at /srv/models/secret.gguf not loaded".into(),
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body["code"], 500);
        assert_eq!(body["error"], true);
        assert!(!body.to_string().contains("secret.gguf"));
    }

    #[tokio::test]
    async fn validation_details_follow_environment() {
        let details = json!({ "message": [{ "code": "length" }] });

        let body = body_of(ServerError::validation(details.clone(), false).into_response()).await;
        assert_eq!(body["code"], 422);
        assert_eq!(body["message"], "Unprocessable Entity");
        assert_eq!(body["details"], details);

        let body = body_of(ServerError::validation(details, true).into_response()).await;
        assert_eq!(body["code"], 422);
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn unauthorized_is_401() {
        let response = ServerError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await["message"], "Unauthorized request origin");
    }

    #[tokio::test]
    async fn panic_payload_becomes_generic_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert_eq!(body["message"], "Unhandled Exception");
        assert_eq!(body["data"], json!([]));
    }
}
