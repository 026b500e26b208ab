//! SQLite settings store
//!
//! Shares the theme database so every process opened on the same file sees
//! one set of settings, including the cached sitemap document.

use super::{SettingsStore, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use sqlx::types::Json;
use std::time::Duration;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    expires_at TEXT
)
";

/// Key/value settings persisted in SQLite
///
/// Expired rows read as absent and are deleted on that read.
#[derive(Debug, Clone)]
pub struct SqlSettingsStore {
    pool: SqlitePool,
}

impl SqlSettingsStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `settings` table if it does not exist
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StoreError::Database`] if the statement fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn expiry(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl?).ok()?;
    Utc::now().checked_add_signed(ttl)
}

#[async_trait]
impl SettingsStore for SqlSettingsStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let row: Option<(Json<Value>, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT value, expires_at FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let Some((Json(value), expires_at)) = row else {
            return Ok(None);
        };
        let now = Utc::now();
        match expires_at {
            Some(at) if at <= now => {
                sqlx::query("DELETE FROM settings WHERE key = ? AND expires_at = ?")
                    .bind(key)
                    .bind(at)
                    .execute(&self.pool)
                    .await?;
                tracing::debug!(key, "setting expired");
                Ok(None)
            }
            _ => Ok(Some(value)),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO settings (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            ",
        )
        .bind(key)
        .bind(Json(value))
        .bind(expiry(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn forget(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
