//! Chat orchestration: prompt → generation → cleaning → chat log.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::cleaner::ResponseCleaner;
use crate::inference::{GenerationError, GenerationOptions, InferenceBackend};
use crate::log_store::{ChatExchange, ChatLogStore, StoreError};
use crate::prompt::PromptFormatter;

#[derive(Debug, Error)]
pub enum ChatError {
    /// No answer was produced; nothing was recorded.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// A produced answer plus the outcome of recording it.
///
/// A failed write does not invalidate the answer; callers decide how to
/// surface `record` (the HTTP layer reports it as `logged: false`).
#[derive(Debug)]
pub struct ChatReply {
    pub answer: String,
    pub record: Result<i64, StoreError>,
}

impl ChatReply {
    pub fn is_logged(&self) -> bool {
        self.record.is_ok()
    }
}

/// Answers user messages with the configured model and logs each exchange.
///
/// Holds no per-request state; one instance serves all requests concurrently.
pub struct ChatService {
    backend: Arc<dyn InferenceBackend>,
    store: Arc<dyn ChatLogStore>,
    formatter: PromptFormatter,
    cleaner: ResponseCleaner,
    options: GenerationOptions,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("backend", &self.backend.name())
            .field("variant", &self.cleaner.variant())
            .field("options", &self.options)
            .finish()
    }
}

impl ChatService {
    /// The cleaner follows the formatter's template variant so prompts and
    /// replies always use the same markers.
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        store: Arc<dyn ChatLogStore>,
        formatter: PromptFormatter,
        options: GenerationOptions,
    ) -> Self {
        let cleaner = ResponseCleaner::new(formatter.variant());
        Self {
            backend,
            store,
            formatter,
            cleaner,
            options,
        }
    }

    pub fn cleaner(&self) -> ResponseCleaner {
        self.cleaner
    }

    /// Generate, clean and record the answer to `message`.
    #[instrument(skip_all, fields(backend = self.backend.name(), message_len = message.len()))]
    pub async fn ask(&self, message: &str) -> Result<ChatReply, ChatError> {
        let asked_at = Utc::now();
        let prompt = self.formatter.render(message).map_err(GenerationError::from)?;

        let raw = self
            .backend
            .generate(&prompt, &self.options)
            .await
            .inspect_err(|e| error!(error = %e, "generation failed"))?;

        let answer = self.cleaner.clean(&raw);
        debug!(raw_len = raw.len(), answer_len = answer.len(), "reply cleaned");

        let record = self.store.record(message, Some(&answer), asked_at).await;
        match &record {
            Ok(id) => debug!(id, "chat exchange recorded"),
            Err(e) => warn!(
                error = %e,
                question = %message,
                answer = %answer,
                timestamp = %asked_at.to_rfc3339(),
                "failed to record chat exchange; dropping it"
            ),
        }

        Ok(ChatReply { answer, record })
    }

    /// Every recorded exchange, oldest first.
    pub async fn history(&self) -> Result<Vec<ChatExchange>, StoreError> {
        self.store.list_all().await
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
