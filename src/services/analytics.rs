use chrono::{Datelike, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::domain::AnalyticsBundle;
use crate::synthetic;

/// Derived dashboard datasets: model performance, usage, and diurnal
/// structure. Each sub-series regenerates independently on the same calendar
/// basis.
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    pub fn load_analytics(&self) -> AnalyticsBundle {
        let now = Utc::now();
        // Day-derived seed: stable across loads within a day
        let mut rng = ChaCha8Rng::seed_from_u64(now.date_naive().num_days_from_ce() as u64);

        AnalyticsBundle {
            radar: synthetic::radar_metrics(&mut rng),
            accuracy_trend: synthetic::accuracy_trend(&mut rng, 30, now),
            locations: synthetic::location_performance(&mut rng),
            hourly_pattern: synthetic::hourly_pattern(&mut rng),
            error_distribution: synthetic::error_histogram(&mut rng),
            weekly_usage: synthetic::usage_week(&mut rng, now),
        }
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}
