//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use kiara_core::ChatService;

use crate::config::Config;
use crate::db::sqlite::SqliteStore;

/// State shared across all HTTP handlers and middleware.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Generation, cleaning and chat-log persistence.
    pub chat: Arc<ChatService>,
    /// Chat log database, probed by the health route.
    pub store: SqliteStore,
}
