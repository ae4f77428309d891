use std::mem::discriminant;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clients::{PredictionClient, StatusResponse};
use crate::domain::ModelStatus;

/// Tri-state model health monitor. Every check re-derives the status from the
/// latest response; the only state carried across checks is the hold window
/// that suppresses rapid flapping.
pub struct StatusMonitor {
    client: PredictionClient,
    default_accuracy: String,
    hold: Duration,
    state: RwLock<StatusState>,
}

struct StatusState {
    current: ModelStatus,
    changed_at: DateTime<Utc>,
}

impl StatusMonitor {
    pub fn new(
        client: PredictionClient,
        default_accuracy: String,
        hold: std::time::Duration,
    ) -> Self {
        let hold = Duration::seconds(hold.as_secs() as i64);
        let current = ModelStatus::Error {
            description: "status not yet checked".to_string(),
            accuracy: default_accuracy.clone(),
        };
        Self {
            client,
            default_accuracy,
            hold,
            state: RwLock::new(StatusState {
                current,
                // Backdated so the first real check always applies
                changed_at: Utc::now() - hold,
            }),
        }
    }

    /// Last exposed status without touching the network
    pub async fn current(&self) -> ModelStatus {
        self.state.read().await.current.clone()
    }

    /// Query the status endpoint and update the exposed status
    pub async fn check(&self) -> ModelStatus {
        let candidate = match self.client.fetch_status().await {
            Ok(resp) => self.derive(resp),
            Err(err) => {
                warn!("model status check failed: {err}");
                ModelStatus::Error {
                    description: err.to_string(),
                    accuracy: self.default_accuracy.clone(),
                }
            }
        };

        let mut state = self.state.write().await;
        let now = Utc::now();
        let variant_change = discriminant(&candidate) != discriminant(&state.current);

        if variant_change && now - state.changed_at < self.hold {
            debug!("status flap inside hold window, keeping {:?}", state.current);
            return state.current.clone();
        }
        if variant_change {
            info!("model status changed: {:?} -> {:?}", state.current, candidate);
            state.changed_at = now;
        }
        state.current = candidate.clone();
        candidate
    }

    fn derive(&self, resp: StatusResponse) -> ModelStatus {
        match resp.status.as_str() {
            "trained_model_active" | "model_active" => ModelStatus::Active {
                model_name: resp.model_name,
                accuracy: resp.accuracy,
            },
            "intelligent_fallback" => ModelStatus::Fallback {
                model_name: resp.model_name,
                accuracy: resp.accuracy,
                description: resp
                    .description
                    .unwrap_or_else(|| "synthetic atmospheric patterns".to_string()),
            },
            other => ModelStatus::Error {
                description: format!("unknown model status '{other}'"),
                accuracy: self.default_accuracy.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
    const NO_HOLD: std::time::Duration = std::time::Duration::from_secs(0);

    /// Serve a canned model-status sequence; responses past the end of the
    /// script return HTTP 500.
    async fn spawn_status_server(script: Vec<serde_json::Value>) -> String {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/forecast/model-status",
            get(move || {
                let calls = calls.clone();
                let script = script.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    match script.get(n) {
                        Some(body) => Json(body.clone()).into_response(),
                        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn monitor(base_url: String, hold: std::time::Duration) -> StatusMonitor {
        let client = PredictionClient::new(base_url, TIMEOUT).unwrap();
        StatusMonitor::new(client, "60-65%".to_string(), hold)
    }

    #[tokio::test]
    async fn test_trained_model_maps_to_active() {
        let base = spawn_status_server(vec![json!({
            "status": "trained_model_active",
            "model_name": "LSTM",
            "accuracy": "85%",
        })])
        .await;
        let monitor = monitor(base, NO_HOLD);

        let status = monitor.check().await;
        assert_eq!(
            status,
            ModelStatus::Active {
                model_name: "LSTM".to_string(),
                accuracy: "85%".to_string(),
            }
        );
        assert_eq!(monitor.current().await, status);
    }

    #[tokio::test]
    async fn test_fallback_status_maps_to_fallback() {
        let base = spawn_status_server(vec![json!({
            "status": "intelligent_fallback",
            "model_name": "Atmospheric Science Patterns",
            "accuracy": "60-65%",
            "description": "Using intelligent atmospheric patterns",
        })])
        .await;
        let monitor = monitor(base, NO_HOLD);

        match monitor.check().await {
            ModelStatus::Fallback { description, .. } => {
                assert_eq!(description, "Using intelligent atmospheric patterns");
            }
            other => panic!("expected Fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_maps_to_error() {
        let monitor = monitor("http://127.0.0.1:9".to_string(), NO_HOLD);

        match monitor.check().await {
            ModelStatus::Error { accuracy, .. } => assert_eq!(accuracy, "60-65%"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_status_string_maps_to_error() {
        let base = spawn_status_server(vec![json!({
            "status": "warming_up",
            "model_name": "LSTM",
            "accuracy": "85%",
        })])
        .await;
        let monitor = monitor(base, NO_HOLD);

        match monitor.check().await {
            ModelStatus::Error { description, .. } => {
                assert!(description.contains("warming_up"));
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_hold_rederives_every_check() {
        let trained = json!({
            "status": "trained_model_active",
            "model_name": "LSTM",
            "accuracy": "85%",
        });
        let base = spawn_status_server(vec![trained]).await;
        let monitor = monitor(base, NO_HOLD);

        assert!(matches!(monitor.check().await, ModelStatus::Active { .. }));
        // Second call runs past the script and gets HTTP 500
        assert!(matches!(monitor.check().await, ModelStatus::Error { .. }));
    }

    #[tokio::test]
    async fn test_hold_window_suppresses_flap() {
        let trained = json!({
            "status": "trained_model_active",
            "model_name": "LSTM",
            "accuracy": "85%",
        });
        let base = spawn_status_server(vec![trained]).await;
        let monitor = monitor(base, std::time::Duration::from_secs(60));

        assert!(matches!(monitor.check().await, ModelStatus::Active { .. }));
        // Upstream now fails, but the change lands inside the hold window
        assert!(matches!(monitor.check().await, ModelStatus::Active { .. }));
        assert!(matches!(monitor.current().await, ModelStatus::Active { .. }));
    }
}
