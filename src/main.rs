/// Main application entry point with clean architecture
mod clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod repo;
mod routes;
mod services;
mod synthetic;
mod utils;

use crate::clients::PredictionClient;
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::repo::{init_db, CacheRepo, KvRepo};
use crate::routes::build_router;
use crate::services::{
    AnalyticsService, ForecastService, HistoryService, SettingsService, StatusMonitor,
    UsageCounter,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!("Configuration loaded successfully");

    // Open the durable local store
    let options = SqliteConnectOptions::new()
        .filename(&config.database_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    info!("Local store opened at {}", config.database_path);

    // Initialize database schema
    init_db(&pool).await?;
    info!("Database schema initialized");

    // Initialize repositories
    let kv_repo = KvRepo::new(pool.clone());
    let cache_repo = CacheRepo::new(pool.clone());

    // Initialize the prediction API client
    let prediction_client =
        PredictionClient::new(config.prediction_api_url.clone(), config.request_timeout)?;

    // Initialize services
    let usage_counter = UsageCounter::new(kv_repo.clone());
    let settings_service =
        Arc::new(SettingsService::load(kv_repo.clone(), cache_repo.clone()).await?);
    let forecast_service = Arc::new(ForecastService::new(
        prediction_client.clone(),
        cache_repo.clone(),
        usage_counter.clone(),
        config.fallback_model_name.clone(),
        config.fallback_accuracy.clone(),
    ));
    let status_monitor = Arc::new(StatusMonitor::new(
        prediction_client,
        config.fallback_accuracy.clone(),
        config.status_hold,
    ));
    let history_service = Arc::new(HistoryService::new());
    let analytics_service = Arc::new(AnalyticsService::new());

    // Initialize application state
    let state = AppState {
        forecast_service,
        status_monitor: status_monitor.clone(),
        history_service,
        analytics_service,
        settings_service,
        usage_counter,
    };

    // Start background tasks
    start_background_tasks(&config, status_monitor);

    // Build router
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("airq_gateway service listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Start the model status poll task
fn start_background_tasks(config: &AppConfig, status_monitor: Arc<StatusMonitor>) {
    let interval = config.status_poll_interval;

    tokio::spawn(async move {
        info!("Starting model status poll task (interval: {:?})", interval);
        loop {
            status_monitor.check().await;
            tokio::time::sleep(interval).await;
        }
    });
}
