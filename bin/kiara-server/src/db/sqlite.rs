//! SQLite implementation of [`ChatLogStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature.  Migrations are run automatically
//! on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR`, so the directory is embedded into the
//! binary.  The database file location is determined at runtime by
//! `KIARA_DATABASE_URL`.
//!
//! # Queries
//!
//! The runtime-verified `sqlx::query` form is used so that no `DATABASE_URL`
//! is needed at compile time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kiara_core::{ChatExchange, ChatLogStore, StoreError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::warn;

/// SQLite-backed chat log.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://kiara.db"`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    /// Private in-memory database.  A single connection that never expires,
    /// because every new `:memory:` connection is a fresh, empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Round-trip a trivial query to prove a connection can be used.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ChatLogStore for SqliteStore {
    async fn record(
        &self,
        question: &str,
        answer: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;
        let result = sqlx::query("INSERT INTO chat (date, questions, answers) VALUES (?1, ?2, ?3)")
            .bind(timestamp.to_rfc3339())
            .bind(question)
            .bind(answer)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        // Dropping `tx` without commit rolls the insert back.
        tx.commit().await.map_err(StoreError::backend)?;
        Ok(result.last_insert_rowid())
    }

    async fn list_all(&self) -> Result<Vec<ChatExchange>, StoreError> {
        let rows: Vec<(i64, String, String, Option<String>)> =
            sqlx::query_as("SELECT id, date, questions, answers FROM chat ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(StoreError::backend)?;

        Ok(rows
            .into_iter()
            .map(|(id, date, question, answer)| ChatExchange {
                id,
                timestamp: date.parse().unwrap_or_else(|e: chrono::ParseError| {
                    warn!(id, raw = %date, error = %e, "failed to parse chat date; using epoch");
                    DateTime::<Utc>::UNIX_EPOCH
                }),
                question,
                answer,
            })
            .collect())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
