/// Utility functions
use chrono::{Datelike, NaiveDate, Weekday};

/// Number of days in a calendar month, leap years included
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    match (
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
        NaiveDate::from_ymd_opt(year, month, 1),
    ) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 0,
    }
}

/// Saturday or Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Round to one decimal place, matching the upstream wire format
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
