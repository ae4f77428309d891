/// Domain models for the application
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Geographic point, validated against the coverage region by the remote
/// prediction service rather than by this layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Parameters of one prediction call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub coordinates: Coordinates,
    pub horizon_hours: u32,
    pub include_uncertainty: bool,
}

/// One forecast hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub timestamp: DateTime<Utc>,
    pub no2: f64,
    pub o3: f64,
    pub aqi: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub coordinates: Coordinates,
    pub horizon_hours: u32,
    pub model_used: String,
    pub accuracy: String,
}

/// Uncertainty envelopes per pollutant, same indexing as the prediction series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UncertaintyBands {
    pub no2: Vec<f64>,
    pub o3: Vec<f64>,
}

/// A complete forecast, real or synthetic. `metadata.model_used` always tells
/// the two apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub predictions: Vec<PredictionPoint>,
    pub metadata: ForecastMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<UncertaintyBands>,
}

/// Latest stored forecast plus the first point's AQI as "current"
#[derive(Debug, Clone, Serialize)]
pub struct CurrentConditions {
    pub aqi: u16,
    pub fetched_at: DateTime<Utc>,
    pub result: ForecastResult,
}

/// Tri-state model health. Exactly one variant holds at any time; transitions
/// are driven only by the status monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelStatus {
    Active {
        model_name: String,
        accuracy: String,
    },
    Fallback {
        model_name: String,
        accuracy: String,
        description: String,
    },
    Error {
        description: String,
        accuracy: String,
    },
}

/// One day of historical data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub no2: f64,
    pub o3: f64,
    pub aqi: u16,
}

/// Summary statistics over a historical point sequence. Always recomputed
/// from the points, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalStats {
    pub avg_no2: f64,
    pub avg_o3: f64,
    pub max_aqi: u16,
    pub count: usize,
}

impl HistoricalStats {
    pub fn from_points(points: &[HistoricalPoint]) -> Self {
        if points.is_empty() {
            return Self {
                avg_no2: 0.0,
                avg_o3: 0.0,
                max_aqi: 0,
                count: 0,
            };
        }
        let n = points.len() as f64;
        Self {
            avg_no2: points.iter().map(|p| p.no2).sum::<f64>() / n,
            avg_o3: points.iter().map(|p| p.o3).sum::<f64>() / n,
            max_aqi: points.iter().map(|p| p.aqi).max().unwrap_or(0),
            count: points.len(),
        }
    }
}

/// Query parameters for the historical endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub days: Option<u32>,
    pub window: Option<u32>,
}

/// One spoke of the performance radar, scaled 0-100
#[derive(Debug, Clone, Serialize)]
pub struct RadarMetric {
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationPerformance {
    pub name: String,
    pub accuracy: f64,
    pub predictions: u32,
}

/// One hour of the 24-hour diurnal pattern
#[derive(Debug, Clone, Serialize)]
pub struct HourlyPoint {
    pub hour: u32,
    pub no2: f64,
    pub o3: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBucket {
    pub bucket: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsagePoint {
    pub date: NaiveDate,
    pub count: u32,
}

/// Derived dashboard datasets. Sub-series are independently regenerable; the
/// only cross-series invariant is the shared calendar basis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsBundle {
    pub radar: Vec<RadarMetric>,
    pub accuracy_trend: Vec<TrendPoint>,
    pub locations: Vec<LocationPerformance>,
    pub hourly_pattern: Vec<HourlyPoint>,
    pub error_distribution: Vec<ErrorBucket>,
    pub weekly_usage: Vec<UsagePoint>,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}

/// User configuration document. Every level defaults field-wise so a partial
/// or stale persisted copy merges over defaults on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notifications: NotificationSettings,
    pub display: DisplaySettings,
    pub location: LocationSettings,
    pub api: ApiSettings,
    pub data_retention: DataRetentionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: NotificationSettings::default(),
            display: DisplaySettings::default(),
            location: LocationSettings::default(),
            api: ApiSettings::default(),
            data_retention: DataRetentionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub aqi_threshold: u16,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            aqi_threshold: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub units: String,
    pub theme: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            units: "ugm3".to_string(),
            theme: "light".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        // Connaught Place, the default dashboard location
        Self {
            latitude: 28.6315,
            longitude: 77.2167,
            name: "Connaught Place".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataRetentionSettings {
    pub history_days: u32,
}

impl Default for DataRetentionSettings {
    fn default() -> Self {
        Self { history_days: 90 }
    }
}

/// Closed set of addressable setting paths. Unknown paths never resolve, so a
/// write can only touch a field that actually exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    NotificationsEnabled,
    NotificationsAqiThreshold,
    DisplayUnits,
    DisplayTheme,
    LocationLatitude,
    LocationLongitude,
    LocationName,
    ApiTimeoutSeconds,
    DataRetentionHistoryDays,
}

impl SettingKey {
    pub const ALL: [SettingKey; 9] = [
        SettingKey::NotificationsEnabled,
        SettingKey::NotificationsAqiThreshold,
        SettingKey::DisplayUnits,
        SettingKey::DisplayTheme,
        SettingKey::LocationLatitude,
        SettingKey::LocationLongitude,
        SettingKey::LocationName,
        SettingKey::ApiTimeoutSeconds,
        SettingKey::DataRetentionHistoryDays,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            SettingKey::NotificationsEnabled => "notifications.enabled",
            SettingKey::NotificationsAqiThreshold => "notifications.aqi_threshold",
            SettingKey::DisplayUnits => "display.units",
            SettingKey::DisplayTheme => "display.theme",
            SettingKey::LocationLatitude => "location.latitude",
            SettingKey::LocationLongitude => "location.longitude",
            SettingKey::LocationName => "location.name",
            SettingKey::ApiTimeoutSeconds => "api.timeout_seconds",
            SettingKey::DataRetentionHistoryDays => "data_retention.history_days",
        }
    }

    pub fn parse(path: &str) -> Option<SettingKey> {
        Self::ALL.iter().copied().find(|k| k.path() == path)
    }

    pub fn get_value(&self, settings: &Settings) -> Value {
        match self {
            SettingKey::NotificationsEnabled => settings.notifications.enabled.into(),
            SettingKey::NotificationsAqiThreshold => settings.notifications.aqi_threshold.into(),
            SettingKey::DisplayUnits => settings.display.units.clone().into(),
            SettingKey::DisplayTheme => settings.display.theme.clone().into(),
            SettingKey::LocationLatitude => settings.location.latitude.into(),
            SettingKey::LocationLongitude => settings.location.longitude.into(),
            SettingKey::LocationName => settings.location.name.clone().into(),
            SettingKey::ApiTimeoutSeconds => settings.api.timeout_seconds.into(),
            SettingKey::DataRetentionHistoryDays => settings.data_retention.history_days.into(),
        }
    }

    /// Apply a JSON value to the field this key addresses. Wrong value types
    /// are rejected, not coerced.
    pub fn apply(&self, settings: &mut Settings, value: &Value) -> Result<(), String> {
        match self {
            SettingKey::NotificationsEnabled => {
                settings.notifications.enabled = as_bool(self, value)?;
            }
            SettingKey::NotificationsAqiThreshold => {
                settings.notifications.aqi_threshold = as_u64(self, value)?
                    .try_into()
                    .map_err(|_| format!("{}: value out of range", self.path()))?;
            }
            SettingKey::DisplayUnits => {
                settings.display.units = as_string(self, value)?;
            }
            SettingKey::DisplayTheme => {
                settings.display.theme = as_string(self, value)?;
            }
            SettingKey::LocationLatitude => {
                settings.location.latitude = as_f64(self, value)?;
            }
            SettingKey::LocationLongitude => {
                settings.location.longitude = as_f64(self, value)?;
            }
            SettingKey::LocationName => {
                settings.location.name = as_string(self, value)?;
            }
            SettingKey::ApiTimeoutSeconds => {
                settings.api.timeout_seconds = as_u64(self, value)?;
            }
            SettingKey::DataRetentionHistoryDays => {
                settings.data_retention.history_days = as_u64(self, value)?
                    .try_into()
                    .map_err(|_| format!("{}: value out of range", self.path()))?;
            }
        }
        Ok(())
    }
}

fn as_bool(key: &SettingKey, value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("{}: expected a boolean", key.path()))
}

fn as_u64(key: &SettingKey, value: &Value) -> Result<u64, String> {
    value
        .as_u64()
        .ok_or_else(|| format!("{}: expected a non-negative integer", key.path()))
}

fn as_f64(key: &SettingKey, value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("{}: expected a number", key.path()))
}

fn as_string(key: &SettingKey, value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("{}: expected a string", key.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_from_points() {
        let points = vec![
            HistoricalPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                no2: 40.0,
                o3: 30.0,
                aqi: 80,
            },
            HistoricalPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                no2: 60.0,
                o3: 50.0,
                aqi: 120,
            },
        ];
        let stats = HistoricalStats::from_points(&points);
        assert_eq!(stats.avg_no2, 50.0);
        assert_eq!(stats.avg_o3, 40.0);
        assert_eq!(stats.max_aqi, 120);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn test_stats_from_empty() {
        let stats = HistoricalStats::from_points(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max_aqi, 0);
    }

    #[test]
    fn test_setting_key_round_trips_through_path() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.path()), Some(key));
        }
    }

    #[test]
    fn test_setting_key_unknown_path() {
        assert_eq!(SettingKey::parse("display.brightness"), None);
        assert_eq!(SettingKey::parse(""), None);
    }

    #[test]
    fn test_apply_rejects_wrong_type() {
        let mut settings = Settings::default();
        let err = SettingKey::DisplayUnits
            .apply(&mut settings, &json!(42))
            .unwrap_err();
        assert!(err.contains("display.units"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_apply_then_get() {
        let mut settings = Settings::default();
        SettingKey::DisplayUnits
            .apply(&mut settings, &json!("ppm"))
            .unwrap();
        assert_eq!(SettingKey::DisplayUnits.get_value(&settings), json!("ppm"));
    }

    #[test]
    fn test_partial_document_merges_over_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"display": {"units": "ppm"}}"#).unwrap();
        assert_eq!(settings.display.units, "ppm");
        assert_eq!(settings.display.theme, "light");
        assert_eq!(settings.api.timeout_seconds, 10);
        assert!(settings.notifications.enabled);
    }
}
