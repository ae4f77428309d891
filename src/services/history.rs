use chrono::{DateTime, Datelike, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::domain::{HistoricalPoint, HistoricalStats, HistoryQuery};
use crate::errors::{ApiError, ApiResult};
use crate::synthetic::{self, AqiDistribution};

const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Time-ranged historical datasets. Generation is currently always local and
/// pure; a real backend call would fall back to the same generators on error,
/// mirroring the forecast path, which is why the signature keeps the Result.
pub struct HistoryService;

impl HistoryService {
    pub fn new() -> Self {
        Self
    }

    /// Month mode when year and month are both supplied, rolling window
    /// otherwise. Stats are recomputed from the returned points on every call.
    pub fn load_historical(
        &self,
        query: &HistoryQuery,
    ) -> ApiResult<(Vec<HistoricalPoint>, HistoricalStats)> {
        let now = Utc::now();
        let mut rng = ChaCha8Rng::seed_from_u64(history_seed(query, now));

        let points = match (query.year, query.month) {
            (Some(year), Some(month)) => {
                if !(1..=12).contains(&month) {
                    return Err(ApiError::InvalidInput(format!(
                        "month {month} out of range 1-12"
                    )));
                }
                synthetic::month_series(&mut rng, year, month, query.days)
            }
            (None, None) => {
                let window = query.window.unwrap_or(DEFAULT_WINDOW_DAYS);
                synthetic::window_series(&mut rng, window, now)
            }
            _ => {
                return Err(ApiError::InvalidInput(
                    "year and month must be supplied together".to_string(),
                ))
            }
        };

        let stats = HistoricalStats::from_points(&points);
        Ok((points, stats))
    }

    pub fn distribution(&self, points: &[HistoricalPoint]) -> AqiDistribution {
        synthetic::aqi_distribution(points)
    }
}

impl Default for HistoryService {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable within a calendar day so repeated dashboard loads agree
fn history_seed(query: &HistoryQuery, now: DateTime<Utc>) -> u64 {
    (now.date_naive().num_days_from_ce() as u64)
        ^ ((query.year.unwrap_or(0) as u64) << 32)
        ^ ((query.month.unwrap_or(0) as u64) << 24)
        ^ ((query.days.unwrap_or(0) as u64) << 16)
        ^ ((query.window.unwrap_or(0) as u64) << 8)
}
