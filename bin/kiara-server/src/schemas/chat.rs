//! Request / response bodies of the chat API.
//!
//! Every response uses the `{code, message, data, error}` envelope the
//! clients of this service already parse.

use kiara_core::{ChatExchange, ChatReply};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

/// Request body for `POST /api/v1/ask`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct AskRequest {
    /// The user's message.
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
}

impl AskRequest {
    /// Checks that need runtime configuration, on top of the derived rules.
    pub fn check_limits(&self, max_bytes: usize) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.message.trim().is_empty() {
            errors.add(
                "message",
                ValidationError::new("blank").with_message("message must not be blank".into()),
            );
        } else if self.message.len() > max_bytes {
            let mut error = ValidationError::new("length")
                .with_message(format!("message exceeds {max_bytes} bytes").into());
            error.add_param("max".into(), &max_bytes);
            error.add_param("actual".into(), &self.message.len());
            errors.add("message", error);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// One turn of the reply in `{role, content}` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// Always `"assistant"` in replies.
    pub role: String,
    pub content: String,
}

/// Response body for `POST /api/v1/ask`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AskResponse {
    pub code: u16,
    /// The cleaned reply.
    pub message: String,
    /// The reply as a single assistant message.
    pub data: Vec<ChatMessage>,
    pub error: bool,
    /// Whether the exchange made it into the chat log.
    pub logged: bool,
}

impl From<ChatReply> for AskResponse {
    fn from(reply: ChatReply) -> Self {
        let logged = reply.is_logged();
        Self {
            code: 200,
            data: vec![ChatMessage {
                role: "assistant".into(),
                content: reply.answer.clone(),
            }],
            message: reply.answer,
            error: false,
            logged,
        }
    }
}

/// A stored exchange as returned by `GET /api/v1/logs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatLogEntry {
    pub id: i64,
    /// RFC 3339 time the question arrived.
    pub timestamp: String,
    pub question: String,
    pub answer: Option<String>,
}

impl From<ChatExchange> for ChatLogEntry {
    fn from(exchange: ChatExchange) -> Self {
        Self {
            id: exchange.id,
            timestamp: exchange.timestamp.to_rfc3339(),
            question: exchange.question,
            answer: exchange.answer,
        }
    }
}

/// Response body for `GET /api/v1/logs`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogsResponse {
    pub code: u16,
    pub message: String,
    /// Oldest first.
    pub data: Vec<ChatLogEntry>,
    pub error: bool,
}

impl LogsResponse {
    pub fn new(exchanges: Vec<ChatExchange>) -> Self {
        Self {
            code: 200,
            message: "OK".into(),
            data: exchanges.into_iter().map(ChatLogEntry::from).collect(),
            error: false,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    /// Field-level validation errors; only outside production.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<serde_json::Value>,
    pub error: bool,
}

// ── Tests ──────────────────────────────────────────────────────────────────────
