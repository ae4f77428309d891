/// Remote prediction API client
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{ForecastRequest, PredictionPoint};
use crate::errors::{ApiError, ApiResult};

/// HTTP client wrapper with common configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("airq-gateway/1.0")
            .build()?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// Wire format of `GET {base}/forecast/model-status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub model_name: String,
    pub accuracy: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictBody {
    latitude: f64,
    longitude: f64,
    hours: u32,
    include_uncertainty: bool,
}

/// Wire format of `POST {base}/forecast/predict`. Location and horizon echoes
/// are ignored; the request already carries them.
#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<PredictionPoint>,
    pub metadata: PredictMetadata,
}

#[derive(Debug, Deserialize)]
pub struct PredictMetadata {
    pub model_used: String,
    pub accuracy: String,
}

/// Client for the remote prediction service
#[derive(Clone)]
pub struct PredictionClient {
    http_client: HttpClient,
    base_url: String,
}

impl PredictionClient {
    pub fn new(base_url: String, timeout: Duration) -> ApiResult<Self> {
        Ok(Self {
            http_client: HttpClient::new(timeout)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch model health from the status endpoint
    pub async fn fetch_status(&self) -> ApiResult<StatusResponse> {
        let url = format!("{}/forecast/model-status", self.base_url);
        let resp = self.http_client.get_client().get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(ApiError::Protocol(format!(
                "model-status returned {}",
                resp.status()
            )));
        }

        decode(resp, "model-status").await
    }

    /// Request a prediction for one location and horizon
    pub async fn fetch_prediction(&self, request: &ForecastRequest) -> ApiResult<PredictResponse> {
        let url = format!("{}/forecast/predict", self.base_url);
        let body = PredictBody {
            latitude: request.coordinates.latitude,
            longitude: request.coordinates.longitude,
            hours: request.horizon_hours,
            include_uncertainty: request.include_uncertainty,
        };

        let resp = self
            .http_client
            .get_client()
            .post(&url)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ApiError::Protocol(format!(
                "predict returned {}",
                resp.status()
            )));
        }

        decode(resp, "predict").await
    }
}

/// Malformed bodies are protocol errors, transport failures stay network errors
async fn decode<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    endpoint: &str,
) -> ApiResult<T> {
    resp.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            ApiError::Protocol(format!("malformed {endpoint} body: {e}"))
        } else {
            ApiError::Network(e)
        }
    })
}
