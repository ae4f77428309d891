use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::clients::PredictionClient;
use crate::domain::{
    Coordinates, CurrentConditions, ForecastMetadata, ForecastRequest, ForecastResult,
};
use crate::errors::{ApiError, ApiResult};
use crate::repo::CacheRepo;
use crate::services::UsageCounter;
use crate::synthetic;

/// Cache namespace holding the latest served forecast payload
pub const FORECAST_CACHE_NS: &str = "forecast_latest";

/// A served forecast plus the upstream error it recovered from, if any.
/// Callers always get usable predictions; `degraded` lets the UI show a
/// degraded-mode notice.
#[derive(Debug)]
pub struct ForecastOutcome {
    pub result: ForecastResult,
    pub degraded: Option<ApiError>,
}

/// Coordinates snapped to a ~10m grid so f64 noise does not split keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RequestKey {
    lat_e4: i64,
    lon_e4: i64,
    horizon: u32,
}

impl RequestKey {
    fn new(coords: Coordinates, horizon: u32) -> Self {
        Self {
            lat_e4: (coords.latitude * 1e4).round() as i64,
            lon_e4: (coords.longitude * 1e4).round() as i64,
            horizon,
        }
    }
}

/// Forecast orchestration: one remote attempt, synthetic fallback, usage
/// accounting, and the current-conditions snapshot.
pub struct ForecastService {
    client: PredictionClient,
    cache: CacheRepo,
    counter: UsageCounter,
    fallback_model_name: String,
    fallback_accuracy: String,
    latest: RwLock<Option<CurrentConditions>>,
    in_flight: Mutex<HashMap<RequestKey, u64>>,
    next_ticket: AtomicU64,
}

impl ForecastService {
    pub fn new(
        client: PredictionClient,
        cache: CacheRepo,
        counter: UsageCounter,
        fallback_model_name: String,
        fallback_accuracy: String,
    ) -> Self {
        Self {
            client,
            cache,
            counter,
            fallback_model_name,
            fallback_accuracy,
            latest: RwLock::new(None),
            in_flight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub async fn get_forecast(
        &self,
        coords: Coordinates,
        horizon_hours: u32,
    ) -> ApiResult<ForecastOutcome> {
        self.get_forecast_with(coords, horizon_hours, false).await
    }

    pub async fn get_forecast_with(
        &self,
        coords: Coordinates,
        horizon_hours: u32,
        include_uncertainty: bool,
    ) -> ApiResult<ForecastOutcome> {
        if horizon_hours == 0 {
            return Err(ApiError::InvalidInput(
                "forecast horizon must be at least one hour".to_string(),
            ));
        }

        // Overlapping calls for the same key: the newest ticket wins, a stale
        // response never overwrites the snapshot
        let key = RequestKey::new(coords, horizon_hours);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        self.in_flight.lock().await.insert(key, ticket);

        let request = ForecastRequest {
            coordinates: coords,
            horizon_hours,
            include_uncertainty,
        };
        let now = Utc::now();

        // Single attempt, no retries: a failed call falls back immediately
        let remote = self
            .client
            .fetch_prediction(&request)
            .await
            .and_then(|resp| {
                if resp.predictions.len() as u32 == horizon_hours {
                    Ok(resp)
                } else {
                    Err(ApiError::Protocol(format!(
                        "upstream returned {} points for a {horizon_hours}-hour horizon",
                        resp.predictions.len()
                    )))
                }
            });

        let outcome = match remote {
            Ok(resp) => ForecastOutcome {
                result: ForecastResult {
                    predictions: resp.predictions,
                    metadata: ForecastMetadata {
                        coordinates: coords,
                        horizon_hours,
                        model_used: resp.metadata.model_used,
                        accuracy: resp.metadata.accuracy,
                    },
                    uncertainty: None,
                },
                degraded: None,
            },
            Err(err) => {
                warn!("prediction call failed, serving synthetic fallback: {err}");
                let seed = synthetic::request_seed(coords, horizon_hours, now);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let predictions = synthetic::forecast_series(&mut rng, coords, horizon_hours, now);
                let uncertainty =
                    include_uncertainty.then(|| synthetic::uncertainty_bands(&predictions));
                ForecastOutcome {
                    result: ForecastResult {
                        predictions,
                        metadata: ForecastMetadata {
                            coordinates: coords,
                            horizon_hours,
                            model_used: self.fallback_model_name.clone(),
                            accuracy: self.fallback_accuracy.clone(),
                        },
                        uncertainty,
                    },
                    degraded: Some(err),
                }
            }
        };

        // A fallback counts as a served prediction too
        self.counter.increment().await?;

        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(&key) == Some(&ticket) {
            in_flight.remove(&key);
            drop(in_flight);
            self.store_current(&outcome.result, now).await?;
        } else {
            debug!("forecast response superseded by a newer request");
        }

        Ok(outcome)
    }

    /// Latest stored snapshot, real or synthetic
    pub async fn current(&self) -> Option<CurrentConditions> {
        self.latest.read().await.clone()
    }

    async fn store_current(
        &self,
        result: &ForecastResult,
        fetched_at: DateTime<Utc>,
    ) -> ApiResult<()> {
        let aqi = result.predictions.first().map(|p| p.aqi).unwrap_or(0);
        *self.latest.write().await = Some(CurrentConditions {
            aqi,
            fetched_at,
            result: result.clone(),
        });

        let payload = serde_json::to_value(result)
            .map_err(|e| ApiError::Internal(format!("serialize forecast: {e}")))?;
        self.cache.write(FORECAST_CACHE_NS, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{init_db, KvRepo};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Duration;
    use serde_json::{json, Value};
    use sqlx::SqlitePool;

    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

    fn delhi() -> Coordinates {
        Coordinates {
            latitude: 28.65,
            longitude: 77.2,
        }
    }

    async fn test_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        pool
    }

    fn service(pool: &SqlitePool, base_url: String) -> ForecastService {
        ForecastService::new(
            PredictionClient::new(base_url, TIMEOUT).unwrap(),
            CacheRepo::new(pool.clone()),
            UsageCounter::new(KvRepo::new(pool.clone())),
            "Atmospheric Science Patterns".to_string(),
            "60-65%".to_string(),
        )
    }

    /// Serve canned predictions; `points` controls how many come back
    /// regardless of the requested horizon (None = echo the request).
    async fn spawn_predict_server(points: Option<u32>) -> String {
        let app = Router::new().route(
            "/forecast/predict",
            post(move |Json(body): Json<Value>| async move {
                let hours = body["hours"].as_u64().unwrap_or(24) as u32;
                let count = points.unwrap_or(hours);
                let now = Utc::now();
                let predictions: Vec<Value> = (0..count)
                    .map(|i| {
                        json!({
                            "timestamp": (now + Duration::hours(i as i64)).to_rfc3339(),
                            "no2": 40.0,
                            "o3": 30.0,
                            "aqi": 80,
                        })
                    })
                    .collect();
                Json(json!({
                    "predictions": predictions,
                    "metadata": {"model_used": "lstm", "accuracy": "85%"},
                }))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_live_forecast_passes_through() {
        let pool = test_pool().await;
        let base = spawn_predict_server(None).await;
        let service = service(&pool, base);

        let outcome = service.get_forecast(delhi(), 24).await.unwrap();
        assert!(outcome.degraded.is_none());
        assert_eq!(outcome.result.predictions.len(), 24);
        assert_eq!(outcome.result.metadata.model_used, "lstm");
        assert_eq!(outcome.result.metadata.accuracy, "85%");

        // Counter and snapshot were updated before the call returned
        assert_eq!(service.counter.value().await.unwrap(), 1);
        let current = service.current().await.unwrap();
        assert_eq!(current.aqi, 80);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_falls_back() {
        let pool = test_pool().await;
        let service = service(&pool, "http://127.0.0.1:9".to_string());

        let outcome = service.get_forecast(delhi(), 24).await.unwrap();
        let degraded = outcome.degraded.expect("fallback must surface the error");
        assert!(matches!(degraded, ApiError::Network(_)));

        // Fallback output is marked and structurally complete
        assert_eq!(
            outcome.result.metadata.model_used,
            "Atmospheric Science Patterns"
        );
        assert_eq!(outcome.result.metadata.accuracy, "60-65%");
        assert_eq!(outcome.result.predictions.len(), 24);
        for pair in outcome.result.predictions.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }

        // Exactly one increment, and the snapshot stored as if real
        assert_eq!(service.counter.value().await.unwrap(), 1);
        assert!(service.current().await.is_some());
        let cached = service
            .cache
            .get_latest(FORECAST_CACHE_NS)
            .await
            .unwrap()
            .expect("latest payload mirrored to cache");
        assert_eq!(cached.payload["metadata"]["model_used"], json!("Atmospheric Science Patterns"));
    }

    #[tokio::test]
    async fn test_wrong_length_body_is_protocol_fallback() {
        let pool = test_pool().await;
        let base = spawn_predict_server(Some(3)).await;
        let service = service(&pool, base);

        let outcome = service.get_forecast(delhi(), 24).await.unwrap();
        assert!(matches!(outcome.degraded, Some(ApiError::Protocol(_))));
        assert_eq!(outcome.result.predictions.len(), 24);
        assert_eq!(
            outcome.result.metadata.model_used,
            "Atmospheric Science Patterns"
        );
    }

    #[tokio::test]
    async fn test_zero_horizon_rejected() {
        let pool = test_pool().await;
        let service = service(&pool, "http://127.0.0.1:9".to_string());

        let err = service.get_forecast(delhi(), 0).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        // Rejected requests are not served predictions
        assert_eq!(service.counter.value().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_uncertainty_bands_on_fallback() {
        let pool = test_pool().await;
        let service = service(&pool, "http://127.0.0.1:9".to_string());

        let outcome = service
            .get_forecast_with(delhi(), 12, true)
            .await
            .unwrap();
        let bands = outcome.result.uncertainty.expect("bands requested");
        assert_eq!(bands.no2.len(), 12);
        assert_eq!(bands.o3.len(), 12);
    }

    #[tokio::test]
    async fn test_each_call_increments_counter_once() {
        let pool = test_pool().await;
        let base = spawn_predict_server(None).await;
        let service = service(&pool, base);

        service.get_forecast(delhi(), 12).await.unwrap();
        service.get_forecast(delhi(), 12).await.unwrap();
        assert_eq!(service.counter.value().await.unwrap(), 2);
    }
}
