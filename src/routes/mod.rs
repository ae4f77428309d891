/// Application routes configuration
use crate::handlers::{
    check_model_status, clear_settings, get_analytics, get_current_conditions, get_history,
    get_model_status, get_setting, get_settings, get_usage, health, request_forecast,
    reset_settings, update_setting, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Forecast endpoints
        .route("/forecast", post(request_forecast))
        .route("/forecast/current", get(get_current_conditions))
        // Model status endpoints
        .route("/model-status", get(get_model_status))
        .route("/model-status/check", get(check_model_status))
        // Aggregate endpoints
        .route("/history", get(get_history))
        .route("/analytics", get(get_analytics))
        // Settings and usage endpoints
        .route("/settings", get(get_settings).post(update_setting))
        .route("/settings/reset", post(reset_settings))
        .route("/settings/clear", post(clear_settings))
        .route("/settings/:path", get(get_setting))
        .route("/usage", get(get_usage))
        .with_state(state)
}
