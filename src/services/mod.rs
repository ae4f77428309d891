/// Business logic services layer
mod analytics;
mod forecast;
mod history;
mod settings;
mod status;

pub use analytics::AnalyticsService;
pub use forecast::{ForecastOutcome, ForecastService, FORECAST_CACHE_NS};
pub use history::HistoryService;
pub use settings::SettingsService;
pub use status::StatusMonitor;

use crate::errors::ApiResult;
use crate::repo::KvRepo;

/// Served-prediction counter, persisted across sessions. Never decremented;
/// only a full store wipe resets it.
#[derive(Clone)]
pub struct UsageCounter {
    kv: KvRepo,
}

impl UsageCounter {
    pub fn new(kv: KvRepo) -> Self {
        Self { kv }
    }

    pub async fn value(&self) -> ApiResult<u64> {
        self.kv.counter().await
    }

    pub async fn increment(&self) -> ApiResult<u64> {
        self.kv.increment_counter().await
    }
}
