/// Application configuration module
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_path: String,
    pub prediction_api_url: String,
    pub bind_addr: String,
    pub request_timeout: Duration,
    pub status_poll_interval: Duration,
    pub status_hold: Duration,
    pub fallback_model_name: String,
    pub fallback_accuracy: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "airq_gateway.db".to_string());

        let prediction_api_url = env::var("PREDICTION_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let fallback_model_name = env::var("FALLBACK_MODEL_NAME")
            .unwrap_or_else(|_| "Atmospheric Science Patterns".to_string());

        let fallback_accuracy =
            env::var("FALLBACK_ACCURACY").unwrap_or_else(|_| "60-65%".to_string());

        Ok(Self {
            database_path,
            prediction_api_url,
            bind_addr,
            request_timeout: Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECS", 10)),
            status_poll_interval: Duration::from_secs(env_u64("STATUS_POLL_SECONDS", 60)),
            status_hold: Duration::from_secs(env_u64("STATUS_HOLD_SECONDS", 0)),
            fallback_model_name,
            fallback_accuracy,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
