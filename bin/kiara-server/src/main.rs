//! kiara-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (stdout, optional JSON and log file).
//! 3. Open the SQLite chat log and run pending migrations.
//! 4. Connect the inference backend and load the chat template.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.
//! 6. Close the database pool.

mod config;
mod db;
mod error;
mod extract;
mod logging;
mod middleware;
mod routes;
mod schemas;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use kiara_core::{ChatService, LlamaServerBackend, PromptFormatter};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = logging::init(&cfg);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = cfg.environment(),
        "kiara-server starting"
    );

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url, cfg.db_max_connections).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Inference ───────────────────────────────────────────────────────────
    let backend = LlamaServerBackend::new(
        &cfg.inference_url,
        cfg.inference_timeout,
        cfg.max_concurrent_generations,
    )?;
    let formatter = match &cfg.chat_template_file {
        Some(path) => PromptFormatter::from_template_file(cfg.template, path)?,
        None => PromptFormatter::new(cfg.template),
    }
    .with_system_prompt(cfg.system_prompt.clone());
    info!(
        model = %cfg.model,
        template = %cfg.template,
        completion_url = backend.completion_url(),
        "inference backend configured"
    );

    let chat = ChatService::new(
        Arc::new(backend),
        Arc::new(store.clone()),
        formatter,
        cfg.generation,
    );

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        chat: Arc::new(chat),
        store: store.clone(),
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 6. Cleanup ─────────────────────────────────────────────────────────────
    store.close().await;

    info!("kiara-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
