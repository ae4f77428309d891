/// Repository layer for the durable local store
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::errors::{ApiError, ApiResult};

/// Well-known keys in the key-value store
pub const SETTINGS_KEY: &str = "settings";
pub const USAGE_COUNTER_KEY: &str = "usage_counter";

/// Flat key-value store backing settings and counters
#[derive(Clone)]
pub struct KvRepo {
    pool: SqlitePool,
}

impl KvRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn put(&self, key: &str, value: &str) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO kv_store(key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Wipe every key
    pub async fn clear(&self) -> ApiResult<()> {
        sqlx::query("DELETE FROM kv_store").execute(&self.pool).await?;
        Ok(())
    }

    /// Current usage counter value; a missing key reads as zero
    pub async fn counter(&self) -> ApiResult<u64> {
        let raw = self.get(USAGE_COUNTER_KEY).await?;
        match raw {
            Some(s) => s
                .parse::<u64>()
                .map_err(|e| ApiError::Internal(format!("corrupt usage counter '{s}': {e}"))),
            None => Ok(0),
        }
    }

    /// Atomic counter bump; returns the new value
    pub async fn increment_counter(&self) -> ApiResult<u64> {
        sqlx::query(
            "INSERT INTO kv_store(key, value, updated_at) VALUES (?, '1', ?)
             ON CONFLICT(key) DO UPDATE
             SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT),
                 updated_at = excluded.updated_at",
        )
        .bind(USAGE_COUNTER_KEY)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        self.counter().await
    }
}

/// Latest cached payload per namespace
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: i64,
    pub namespace: String,
    pub fetched_at: DateTime<Utc>,
    pub payload: Value,
}

/// Cache namespaces holding the latest fetched payloads, wiped in bulk by
/// clear_all
#[derive(Clone)]
pub struct CacheRepo {
    pool: SqlitePool,
}

impl CacheRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn write(&self, namespace: &str, payload: &Value) -> ApiResult<()> {
        sqlx::query("INSERT INTO data_cache(namespace, fetched_at, payload) VALUES (?, ?, ?)")
            .bind(namespace)
            .bind(Utc::now().to_rfc3339())
            .bind(payload.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_latest(&self, namespace: &str) -> ApiResult<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, (i64, String, String, String)>(
            "SELECT id, namespace, fetched_at, payload FROM data_cache
             WHERE namespace = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, namespace, fetched_at, payload)| {
            let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ApiError::Internal(format!("corrupt cache timestamp: {e}")))?;
            let payload: Value = serde_json::from_str(&payload)
                .map_err(|e| ApiError::Internal(format!("corrupt cache payload: {e}")))?;
            Ok(CacheEntry {
                id,
                namespace,
                fetched_at,
                payload,
            })
        })
        .transpose()
    }

    pub async fn clear_all(&self) -> ApiResult<()> {
        sqlx::query("DELETE FROM data_cache")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Initialize database tables
pub async fn init_db(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS kv_store(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS data_cache(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace TEXT NOT NULL,
            fetched_at TEXT NOT NULL,
            payload TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS ix_data_cache_namespace
         ON data_cache(namespace, id DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_kv_round_trip() {
        let kv = KvRepo::new(test_pool().await);
        assert_eq!(kv.get("missing").await.unwrap(), None);

        kv.put("settings", "{}").await.unwrap();
        assert_eq!(kv.get("settings").await.unwrap().as_deref(), Some("{}"));

        kv.put("settings", r#"{"a":1}"#).await.unwrap();
        assert_eq!(
            kv.get("settings").await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );

        kv.delete("settings").await.unwrap();
        assert_eq!(kv.get("settings").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_counter_starts_at_zero_and_increments() {
        let kv = KvRepo::new(test_pool().await);
        assert_eq!(kv.counter().await.unwrap(), 0);
        assert_eq!(kv.increment_counter().await.unwrap(), 1);
        assert_eq!(kv.increment_counter().await.unwrap(), 2);
        assert_eq!(kv.counter().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_wipes_counter() {
        let kv = KvRepo::new(test_pool().await);
        kv.increment_counter().await.unwrap();
        kv.clear().await.unwrap();
        assert_eq!(kv.counter().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_latest_and_clear() {
        let cache = CacheRepo::new(test_pool().await);
        assert!(cache.get_latest("forecast").await.unwrap().is_none());

        cache.write("forecast", &json!({"v": 1})).await.unwrap();
        cache.write("forecast", &json!({"v": 2})).await.unwrap();

        let latest = cache.get_latest("forecast").await.unwrap().unwrap();
        assert_eq!(latest.payload, json!({"v": 2}));
        assert_eq!(latest.namespace, "forecast");

        cache.clear_all().await.unwrap();
        assert!(cache.get_latest("forecast").await.unwrap().is_none());
    }
}
