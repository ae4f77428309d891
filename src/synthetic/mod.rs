/// Synthetic pollutant data generation.
///
/// Pure generators used both as the fallback when the prediction API is
/// unavailable and as the data source for historical/analytics views. Every
/// generator takes an explicit RNG so callers decide between a fixed seed
/// (tests) and a request-derived seed (production).
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use rand::Rng;
use serde::Serialize;

use crate::domain::{
    Coordinates, ErrorBucket, HistoricalPoint, HourlyPoint, LocationPerformance,
    PredictionPoint, RadarMetric, TrendPoint, UncertaintyBands, UsagePoint,
};
use crate::utils::{days_in_month, is_weekend, round1};

/// Monthly pollution multipliers for the Delhi NCR basin: winter inversion
/// peaks, monsoon washout trough in July/August.
const MONTHLY_POLLUTION: [f64; 12] = [
    1.8, 1.6, 1.3, 1.0, 0.9, 0.8, 0.7, 0.75, 0.9, 1.3, 1.7, 1.9,
];

const WEEKDAY_FACTOR: f64 = 1.2;
const WEEKEND_FACTOR: f64 = 0.8;

const NO2_TO_AQI: f64 = 2.0;
const O3_TO_AQI: f64 = 1.5;
pub const AQI_MAX: u16 = 500;

/// Uncertainty fractions applied to each pollutant series
const NO2_UNCERTAINTY: f64 = 0.12;
const O3_UNCERTAINTY: f64 = 0.10;

/// Named locations the dashboard offers as presets
pub const LOCATIONS: [(&str, f64, f64); 5] = [
    ("Connaught Place", 28.6315, 77.2167),
    ("India Gate", 28.6129, 77.2295),
    ("Dwarka", 28.5921, 77.0460),
    ("Gurgaon", 28.4595, 77.0266),
    ("Noida", 28.5355, 77.3910),
];

/// Emission characteristics of an area within the coverage region
#[derive(Debug, Clone, Copy)]
pub struct LocationFactors {
    pub pollution: f64,
    pub traffic: f64,
    pub o3: f64,
    pub photochemical: f64,
    pub no2_offset: f64,
    pub o3_offset: f64,
}

const DEFAULT_FACTORS: LocationFactors = LocationFactors {
    pollution: 1.0,
    traffic: 1.0,
    o3: 1.0,
    photochemical: 1.0,
    no2_offset: 0.0,
    o3_offset: 0.0,
};

struct Zone {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    factors: LocationFactors,
}

// First match wins; Central Delhi encloses Connaught Place and shadows it.
const ZONES: [Zone; 5] = [
    // Central Delhi: heavy traffic, O3 suppressed by NO titration
    Zone {
        min_lat: 28.60,
        max_lat: 28.70,
        min_lon: 77.15,
        max_lon: 77.25,
        factors: LocationFactors {
            pollution: 1.3,
            traffic: 1.4,
            o3: 0.9,
            photochemical: 0.8,
            no2_offset: 10.0,
            o3_offset: -5.0,
        },
    },
    // Connaught Place
    Zone {
        min_lat: 28.62,
        max_lat: 28.64,
        min_lon: 77.20,
        max_lon: 77.22,
        factors: LocationFactors {
            pollution: 1.5,
            traffic: 1.6,
            o3: 0.8,
            photochemical: 0.7,
            no2_offset: 15.0,
            o3_offset: -8.0,
        },
    },
    // Gurgaon
    Zone {
        min_lat: 28.40,
        max_lat: 28.50,
        min_lon: 77.00,
        max_lon: 77.10,
        factors: LocationFactors {
            pollution: 1.2,
            traffic: 1.3,
            o3: 1.1,
            photochemical: 1.0,
            no2_offset: 8.0,
            o3_offset: 2.0,
        },
    },
    // Noida
    Zone {
        min_lat: 28.50,
        max_lat: 28.60,
        min_lon: 77.30,
        max_lon: 77.40,
        factors: LocationFactors {
            pollution: 1.1,
            traffic: 1.2,
            o3: 1.2,
            photochemical: 1.1,
            no2_offset: 5.0,
            o3_offset: 5.0,
        },
    },
    // Dwarka
    Zone {
        min_lat: 28.55,
        max_lat: 28.65,
        min_lon: 77.00,
        max_lon: 77.10,
        factors: LocationFactors {
            pollution: 0.9,
            traffic: 1.0,
            o3: 1.3,
            photochemical: 1.2,
            no2_offset: 0.0,
            o3_offset: 8.0,
        },
    },
];

pub fn location_factors(coords: Coordinates) -> LocationFactors {
    ZONES
        .iter()
        .find(|z| {
            z.min_lat <= coords.latitude
                && coords.latitude <= z.max_lat
                && z.min_lon <= coords.longitude
                && coords.longitude <= z.max_lon
        })
        .map(|z| z.factors)
        .unwrap_or(DEFAULT_FACTORS)
}

/// AQI from pollutant concentrations, clamped to [0, 500]
pub fn aqi_from(no2: f64, o3: f64) -> u16 {
    (no2 * NO2_TO_AQI)
        .max(o3 * O3_TO_AQI)
        .round()
        .clamp(0.0, AQI_MAX as f64) as u16
}

/// NO2 traffic factor: elevated in the morning and evening rush bands
fn no2_time_factor(hour: u32) -> f64 {
    match hour {
        7..=9 | 17..=19 => 1.4,
        10..=16 => 1.1,
        _ => 0.7,
    }
}

/// O3 diurnal factor: photochemical afternoon peak, morning buildup
fn o3_time_factor(hour: u32, photochemical: f64) -> f64 {
    match hour {
        12..=16 => 1.5 * photochemical,
        6..=11 => 1.2,
        _ => 0.6,
    }
}

/// Hourly forecast series: exactly `horizon_hours` points at one-hour cadence
/// starting at `now`.
pub fn forecast_series(
    rng: &mut impl Rng,
    coords: Coordinates,
    horizon_hours: u32,
    now: DateTime<Utc>,
) -> Vec<PredictionPoint> {
    let factors = location_factors(coords);
    let start_hour = now.hour();

    let no2_base = (50.0 + (start_hour as f64 - 12.0) * 2.0) * factors.pollution;
    let o3_base = (40.0 + (14.0 - start_hour as f64) * 1.5) * factors.o3;

    (0..horizon_hours)
        .map(|i| {
            let timestamp = now + Duration::hours(i as i64);
            let hour = timestamp.hour();

            let no2 = round1(
                (no2_base * factors.traffic * no2_time_factor(hour)
                    + i as f64 * 0.3
                    + factors.no2_offset
                    + rng.random_range(-4.0..4.0))
                .clamp(15.0, 120.0),
            );
            let o3 = round1(
                (o3_base * o3_time_factor(hour, factors.photochemical)
                    + i as f64 * 0.2
                    + factors.o3_offset
                    + rng.random_range(-3.0..3.0))
                .clamp(10.0, 90.0),
            );

            PredictionPoint {
                timestamp,
                no2,
                o3,
                aqi: aqi_from(no2, o3),
            }
        })
        .collect()
}

/// Uncertainty envelopes derived from a prediction series
pub fn uncertainty_bands(predictions: &[PredictionPoint]) -> UncertaintyBands {
    UncertaintyBands {
        no2: predictions
            .iter()
            .map(|p| round1(p.no2 * NO2_UNCERTAINTY))
            .collect(),
        o3: predictions
            .iter()
            .map(|p| round1(p.o3 * O3_UNCERTAINTY))
            .collect(),
    }
}

/// Daily series for one calendar month. Emits one point per day, capped at
/// `day_cap` when supplied. `month` must be in 1..=12.
pub fn month_series(
    rng: &mut impl Rng,
    year: i32,
    month: u32,
    day_cap: Option<u32>,
) -> Vec<HistoricalPoint> {
    let days = days_in_month(year, month);
    let count = day_cap.map_or(days, |cap| cap.min(days));
    let monthly = MONTHLY_POLLUTION[(month.clamp(1, 12) - 1) as usize];
    // Winter inversion boosts NO2; O3 moves the other way (titration)
    let o3_monthly = 1.5 - 0.5 * monthly;

    (1..=count)
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| {
            let weekday = if is_weekend(date) {
                WEEKEND_FACTOR
            } else {
                WEEKDAY_FACTOR
            };
            let no2 = round1((45.0 * monthly * weekday + rng.random_range(-5.0..5.0)).max(5.0));
            let o3 = round1((40.0 * o3_monthly * weekday + rng.random_range(-4.0..4.0)).max(5.0));
            HistoricalPoint {
                date,
                no2,
                o3,
                aqi: aqi_from(no2, o3),
            }
        })
        .collect()
}

/// Daily series for a rolling window ending today. A sinusoidal seasonal
/// factor scales NO2 and inversely modulates O3.
pub fn window_series(
    rng: &mut impl Rng,
    window_days: u32,
    now: DateTime<Utc>,
) -> Vec<HistoricalPoint> {
    let today = now.date_naive();

    (0..window_days)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back as i64);
            let seasonal =
                1.0 + 0.3 * (2.0 * std::f64::consts::PI * date.ordinal() as f64 / 365.0).sin();
            let no2 = round1((45.0 * seasonal + rng.random_range(-5.0..5.0)).max(5.0));
            let o3 = round1((40.0 * (2.0 - seasonal) + rng.random_range(-4.0..4.0)).max(5.0));
            HistoricalPoint {
                date,
                no2,
                o3,
                aqi: aqi_from(no2, o3),
            }
        })
        .collect()
}

/// 24-point diurnal pattern: NO2 peaks in the rush bands, O3 in the afternoon
pub fn hourly_pattern(rng: &mut impl Rng) -> Vec<HourlyPoint> {
    (0..24)
        .map(|hour| HourlyPoint {
            hour,
            no2: round1((35.0 * no2_time_factor(hour) + rng.random_range(-3.0..3.0)).max(5.0)),
            o3: round1((30.0 * o3_time_factor(hour, 1.0) + rng.random_range(-2.0..2.0)).max(5.0)),
        })
        .collect()
}

/// AQI classification buckets, exhaustive and mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AqiBucket {
    Good,
    Moderate,
    Unhealthy,
    VeryUnhealthy,
}

impl AqiBucket {
    pub fn classify(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiBucket::Good,
            51..=100 => AqiBucket::Moderate,
            101..=200 => AqiBucket::Unhealthy,
            _ => AqiBucket::VeryUnhealthy,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiBucket::Good => "Good",
            AqiBucket::Moderate => "Moderate",
            AqiBucket::Unhealthy => "Unhealthy",
            AqiBucket::VeryUnhealthy => "Very Unhealthy",
        }
    }
}

/// Bucket counts over a point sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AqiDistribution {
    pub good: usize,
    pub moderate: usize,
    pub unhealthy: usize,
    pub very_unhealthy: usize,
}

/// Single linear scan over the points
pub fn aqi_distribution(points: &[HistoricalPoint]) -> AqiDistribution {
    let mut dist = AqiDistribution::default();
    for point in points {
        match AqiBucket::classify(point.aqi) {
            AqiBucket::Good => dist.good += 1,
            AqiBucket::Moderate => dist.moderate += 1,
            AqiBucket::Unhealthy => dist.unhealthy += 1,
            AqiBucket::VeryUnhealthy => dist.very_unhealthy += 1,
        }
    }
    dist
}

pub fn radar_metrics(rng: &mut impl Rng) -> Vec<RadarMetric> {
    [
        ("Accuracy", 85.0_f64),
        ("RMSE Score", 78.0),
        ("Latency", 92.0),
        ("Uptime", 99.0),
        ("Coverage", 88.0),
    ]
    .into_iter()
    .map(|(metric, base)| RadarMetric {
        metric: metric.to_string(),
        value: round1((base + rng.random_range(-3.0..3.0)).clamp(0.0, 100.0)),
    })
    .collect()
}

/// Accuracy trend over the trailing `days` days, ending today
pub fn accuracy_trend(rng: &mut impl Rng, days: u32, now: DateTime<Utc>) -> Vec<TrendPoint> {
    let today = now.date_naive();
    (0..days)
        .rev()
        .map(|back| {
            let progress = (days - 1 - back) as f64 / days.max(1) as f64;
            TrendPoint {
                date: today - Duration::days(back as i64),
                accuracy: round1((80.0 + 4.0 * progress + rng.random_range(-2.0..2.0))
                    .clamp(70.0, 95.0)),
            }
        })
        .collect()
}

pub fn location_performance(rng: &mut impl Rng) -> Vec<LocationPerformance> {
    LOCATIONS
        .iter()
        .map(|(name, _, _)| LocationPerformance {
            name: name.to_string(),
            accuracy: round1(rng.random_range(78.0..90.0)),
            predictions: rng.random_range(400..1600),
        })
        .collect()
}

/// Histogram of absolute AQI prediction errors. Small errors dominate by
/// construction.
pub fn error_histogram(rng: &mut impl Rng) -> Vec<ErrorBucket> {
    [("0-10", 120u32), ("10-25", 75), ("25-50", 40), ("50+", 15)]
        .into_iter()
        .map(|(bucket, base)| ErrorBucket {
            bucket: bucket.to_string(),
            count: base + rng.random_range(0..10),
        })
        .collect()
}

/// Served-prediction counts for the trailing seven days
pub fn usage_week(rng: &mut impl Rng, now: DateTime<Utc>) -> Vec<UsagePoint> {
    let today = now.date_naive();
    (0..7u32)
        .rev()
        .map(|back| UsagePoint {
            date: today - Duration::days(back as i64),
            count: rng.random_range(30..90),
        })
        .collect()
}

/// Production seed derivation: request parameters folded with the clock
pub fn request_seed(coords: Coordinates, horizon_hours: u32, now: DateTime<Utc>) -> u64 {
    coords.latitude.to_bits()
        ^ coords.longitude.to_bits().rotate_left(17)
        ^ (horizon_hours as u64).rotate_left(34)
        ^ now.timestamp_millis() as u64
}
