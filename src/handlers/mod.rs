/// HTTP request handlers
use crate::domain::{Coordinates, Health, HistoryQuery, SettingKey};
use crate::errors::ApiError;
use crate::services::{
    AnalyticsService, ForecastService, HistoryService, SettingsService, StatusMonitor,
    UsageCounter,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub forecast_service: Arc<ForecastService>,
    pub status_monitor: Arc<StatusMonitor>,
    pub history_service: Arc<HistoryService>,
    pub analytics_service: Arc<AnalyticsService>,
    pub settings_service: Arc<SettingsService>,
    pub usage_counter: UsageCounter,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

#[derive(Deserialize)]
pub struct ForecastBody {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_hours")]
    pub hours: u32,
    #[serde(default)]
    pub include_uncertainty: bool,
}

fn default_hours() -> u32 {
    24
}

/// Request a forecast. The response is always a usable prediction series;
/// `degraded` carries the upstream error when a fallback was served.
pub async fn request_forecast(
    State(state): State<AppState>,
    Json(body): Json<ForecastBody>,
) -> Result<Json<Value>, ApiError> {
    let coords = Coordinates {
        latitude: body.latitude,
        longitude: body.longitude,
    };
    let outcome = state
        .forecast_service
        .get_forecast_with(coords, body.hours, body.include_uncertainty)
        .await?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "degraded": outcome.degraded.as_ref().map(|e| e.detail()),
        "result": outcome.result,
    })))
}

/// Get the latest stored forecast snapshot
pub async fn get_current_conditions(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    match state.forecast_service.current().await {
        Some(current) => Ok(Json(serde_json::json!(SuccessResponse::new(current)))),
        None => Ok(Json(serde_json::json!(SuccessResponse::new(
            serde_json::json!({
                "message": "no data"
            })
        )))),
    }
}

/// Get the exposed model status without a network round trip
pub async fn get_model_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.status_monitor.current().await;
    Json(serde_json::json!(SuccessResponse::new(serde_json::json!({
        "status": status
    }))))
}

/// Force a model status re-check
pub async fn check_model_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.status_monitor.check().await;
    Json(serde_json::json!(SuccessResponse::new(serde_json::json!({
        "status": status
    }))))
}

/// Historical points plus freshly recomputed stats
pub async fn get_history(
    Query(query): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let (points, stats) = state.history_service.load_historical(&query)?;
    let distribution = state.history_service.distribution(&points);

    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "points": points,
            "stats": stats,
            "distribution": distribution,
        })
    ))))
}

/// Dashboard analytics bundle
pub async fn get_analytics(State(state): State<AppState>) -> Json<Value> {
    let bundle = state.analytics_service.load_analytics();
    Json(serde_json::json!(SuccessResponse::new(bundle)))
}

/// Full settings document
pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings_service.snapshot().await;
    Json(serde_json::json!(SuccessResponse::new(serde_json::json!({
        "settings": settings
    }))))
}

/// One setting addressed by its dot path
pub async fn get_setting(
    Path(path): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let key = parse_setting_path(&path)?;
    let value = state.settings_service.get(key).await;
    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "path": path,
            "value": value,
        })
    ))))
}

#[derive(Deserialize)]
pub struct SettingUpdate {
    pub path: String,
    pub value: Value,
}

/// Write one setting; persisted before the response is sent
pub async fn update_setting(
    State(state): State<AppState>,
    Json(update): Json<SettingUpdate>,
) -> Result<Json<Value>, ApiError> {
    let key = parse_setting_path(&update.path)?;
    state.settings_service.set(key, &update.value).await?;
    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "path": update.path,
            "value": update.value,
        })
    ))))
}

/// Restore default settings
pub async fn reset_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.settings_service.reset().await?;
    let settings = state.settings_service.snapshot().await;
    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "settings": settings
        })
    ))))
}

/// Wipe the persisted store and cache namespaces
pub async fn clear_settings(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.settings_service.clear_all().await?;
    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "cleared": true
        })
    ))))
}

/// Total served predictions across sessions
pub async fn get_usage(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.usage_counter.value().await?;
    Ok(Json(serde_json::json!(SuccessResponse::new(
        serde_json::json!({
            "usage_count": count
        })
    ))))
}

fn parse_setting_path(path: &str) -> Result<SettingKey, ApiError> {
    SettingKey::parse(path)
        .ok_or_else(|| ApiError::InvalidInput(format!("unknown setting path '{path}'")))
}
