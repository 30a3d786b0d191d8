//! Chat exchange persistence contract.
//!
//! [`ChatLogStore`] is append-only: records are written once and listed in
//! the order they were acknowledged.  The server crate provides the SQL
//! implementation; [`InMemoryChatLogStore`] backs tests and ephemeral runs.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One question/answer pair as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub answer: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database rejected the operation.
    #[error("chat log backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("chat log store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(e))
    }
}

#[async_trait]
pub trait ChatLogStore: Send + Sync + 'static {
    /// Persist an exchange and return its store-assigned id.
    async fn record(
        &self,
        question: &str,
        answer: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// All exchanges, oldest first.
    async fn list_all(&self) -> Result<Vec<ChatExchange>, StoreError>;
}

/// Process-local store; ids are assigned under the same lock that appends,
/// so id order is insertion order.
#[derive(Debug, Default)]
pub struct InMemoryChatLogStore {
    records: Mutex<Vec<ChatExchange>>,
}

impl InMemoryChatLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatLogStore for InMemoryChatLogStore {
    async fn record(
        &self,
        question: &str,
        answer: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("chat log lock poisoned".into()))?;
        let id = records.len() as i64 + 1;
        records.push(ChatExchange {
            id,
            timestamp,
            question: question.to_owned(),
            answer: answer.map(str::to_owned),
        });
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<ChatExchange>, StoreError> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("chat log lock poisoned".into()))?;
        Ok(records.clone())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
