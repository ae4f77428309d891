use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::{SettingKey, Settings};
use crate::errors::{ApiError, ApiResult};
use crate::repo::{CacheRepo, KvRepo, SETTINGS_KEY};

/// User configuration store. The in-memory document is authoritative for
/// reads; every write is persisted before the call returns, so a get after a
/// set never observes stale state.
pub struct SettingsService {
    kv: KvRepo,
    cache: CacheRepo,
    state: RwLock<Settings>,
}

impl SettingsService {
    /// Load the persisted document merged over defaults. An unreadable
    /// document is discarded rather than taking the service down.
    pub async fn load(kv: KvRepo, cache: CacheRepo) -> ApiResult<Self> {
        let state = match kv.get(SETTINGS_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("discarding unreadable settings document: {e}");
                    Settings::default()
                }
            },
            None => Settings::default(),
        };
        Ok(Self {
            kv,
            cache,
            state: RwLock::new(state),
        })
    }

    pub async fn snapshot(&self) -> Settings {
        self.state.read().await.clone()
    }

    pub async fn get(&self, key: SettingKey) -> Value {
        key.get_value(&*self.state.read().await)
    }

    /// Apply and persist one setting
    pub async fn set(&self, key: SettingKey, value: &Value) -> ApiResult<()> {
        let mut state = self.state.write().await;
        key.apply(&mut state, value).map_err(ApiError::InvalidInput)?;
        let raw = serde_json::to_string(&*state)
            .map_err(|e| ApiError::Internal(format!("serialize settings: {e}")))?;
        self.kv.put(SETTINGS_KEY, &raw).await
    }

    /// Restore defaults and drop the persisted copy
    pub async fn reset(&self) -> ApiResult<()> {
        let mut state = self.state.write().await;
        *state = Settings::default();
        self.kv.delete(SETTINGS_KEY).await
    }

    /// Wipe the persisted store and every cache namespace
    pub async fn clear_all(&self) -> ApiResult<()> {
        let mut state = self.state.write().await;
        *state = Settings::default();
        self.kv.clear().await?;
        self.cache.clear_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::init_db;
    use serde_json::json;
    use sqlx::SqlitePool;

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        pool
    }

    async fn service(pool: &SqlitePool) -> SettingsService {
        SettingsService::load(KvRepo::new(pool.clone()), CacheRepo::new(pool.clone()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get_same_session() {
        let pool = test_pool().await;
        let settings = service(&pool).await;

        settings
            .set(SettingKey::DisplayUnits, &json!("ppm"))
            .await
            .unwrap();
        assert_eq!(settings.get(SettingKey::DisplayUnits).await, json!("ppm"));
    }

    #[tokio::test]
    async fn test_set_survives_reload() {
        let pool = test_pool().await;
        let settings = service(&pool).await;
        settings
            .set(SettingKey::DisplayUnits, &json!("ppm"))
            .await
            .unwrap();
        settings
            .set(SettingKey::ApiTimeoutSeconds, &json!(25))
            .await
            .unwrap();

        // Simulated reload: a fresh service over the same store
        let reloaded = service(&pool).await;
        assert_eq!(reloaded.get(SettingKey::DisplayUnits).await, json!("ppm"));
        assert_eq!(reloaded.get(SettingKey::ApiTimeoutSeconds).await, json!(25));
        // Untouched keys still read their defaults
        assert_eq!(reloaded.get(SettingKey::DisplayTheme).await, json!("light"));
    }

    #[tokio::test]
    async fn test_partial_persisted_document_merges_over_defaults() {
        let pool = test_pool().await;
        let kv = KvRepo::new(pool.clone());
        kv.put(SETTINGS_KEY, r#"{"notifications":{"enabled":false}}"#)
            .await
            .unwrap();

        let settings = service(&pool).await;
        assert_eq!(
            settings.get(SettingKey::NotificationsEnabled).await,
            json!(false)
        );
        assert_eq!(
            settings.get(SettingKey::NotificationsAqiThreshold).await,
            json!(150)
        );
    }

    #[tokio::test]
    async fn test_wrong_value_type_rejected() {
        let pool = test_pool().await;
        let settings = service(&pool).await;

        let err = settings
            .set(SettingKey::ApiTimeoutSeconds, &json!("soon"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        // Nothing was persisted
        assert_eq!(settings.get(SettingKey::ApiTimeoutSeconds).await, json!(10));
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let pool = test_pool().await;
        let settings = service(&pool).await;
        settings
            .set(SettingKey::DisplayTheme, &json!("dark"))
            .await
            .unwrap();

        settings.reset().await.unwrap();
        assert_eq!(settings.snapshot().await, Settings::default());
        assert_eq!(
            KvRepo::new(pool.clone()).get(SETTINGS_KEY).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_clear_all_wipes_store_and_cache() {
        let pool = test_pool().await;
        let kv = KvRepo::new(pool.clone());
        let cache = CacheRepo::new(pool.clone());
        let settings = service(&pool).await;

        settings
            .set(SettingKey::DisplayTheme, &json!("dark"))
            .await
            .unwrap();
        kv.increment_counter().await.unwrap();
        cache.write("forecast_latest", &json!({"v": 1})).await.unwrap();

        settings.clear_all().await.unwrap();
        assert_eq!(settings.snapshot().await, Settings::default());
        assert_eq!(kv.counter().await.unwrap(), 0);
        assert!(cache.get_latest("forecast_latest").await.unwrap().is_none());
    }
}
