use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Row, Sqlite};
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;
use uuid::Uuid;

pub const USER_VOTED_KEY: &str = "vibetheforce_user_voted";
pub const SESSION_KEY: &str = "vibetheforce_session";

/// Small persistent key/value store for client-side flags.
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// A session id unique enough per client: current time plus random entropy.
pub fn new_session_id() -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &entropy[..9])
}

pub struct SqliteFlagStore {
    pool: SqlitePool,
}

impl SqliteFlagStore {
    pub async fn open(db_url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating local flag database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_flags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl FlagStore for SqliteFlagStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM local_flags WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO local_flags (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM local_flags WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// Non-persistent store for unit tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryFlagStore {
    values: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
#[async_trait]
impl FlagStore for MemoryFlagStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_combine_time_and_entropy() {
        let first = new_session_id();
        let second = new_session_id();
        assert_ne!(first, second);

        let (millis, entropy) = first.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(entropy.len(), 9);
    }

    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("flags.db").display());

        let store = SqliteFlagStore::open(&url).await.unwrap();
        assert_eq!(store.get(USER_VOTED_KEY).await.unwrap(), None);
        store.set(USER_VOTED_KEY, "true").await.unwrap();
        store.set(SESSION_KEY, "123-abc").await.unwrap();
        store.set(SESSION_KEY, "456-def").await.unwrap();
        drop(store);

        let reopened = SqliteFlagStore::open(&url).await.unwrap();
        assert_eq!(reopened.get(USER_VOTED_KEY).await.unwrap().as_deref(), Some("true"));
        assert_eq!(reopened.get(SESSION_KEY).await.unwrap().as_deref(), Some("456-def"));

        reopened.remove(USER_VOTED_KEY).await.unwrap();
        assert_eq!(reopened.get(USER_VOTED_KEY).await.unwrap(), None);
        // Removing a missing key is fine
        reopened.remove(USER_VOTED_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryFlagStore::new();
        store.set(SESSION_KEY, "s").await.unwrap();
        assert_eq!(store.get(SESSION_KEY).await.unwrap().as_deref(), Some("s"));
        store.remove(SESSION_KEY).await.unwrap();
        assert_eq!(store.get(SESSION_KEY).await.unwrap(), None);
    }
}
