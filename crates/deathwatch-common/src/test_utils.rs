//! Test utilities and shared fixtures for Deathwatch.
//!
//! Available to other crates' tests through the `testing` feature.

use crate::types::Observation;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test logging once per test run.
static INIT: Once = Once::new();

/// Initialize logging for tests. Safe to call multiple times.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
    });
}

/// Test fixture for a calendar date.
pub fn mock_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Test fixture for a naive UTC timestamp.
pub fn mock_timestamp(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
) -> NaiveDateTime {
    mock_date(year, month, day)
        .and_hms_opt(hour, min, sec)
        .expect("valid fixture time")
}

/// Consecutive daily observations starting at `start`, one per count.
pub fn daily_observations(start: NaiveDate, counts: &[i64]) -> Vec<Observation> {
    counts
        .iter()
        .zip(0i64..)
        .map(|(&count, offset)| Observation::new(start + Duration::days(offset), count))
        .collect()
}

/// The worked example: 2023-01-01..07 with counts 10..70.
pub fn first_week_of_2023() -> Vec<Observation> {
    daily_observations(mock_date(2023, 1, 1), &[10, 20, 30, 40, 50, 60, 70])
}

/// A page of the statistics API as returned for `page=1`.
pub fn api_page_json(observations: &[Observation], next: Option<&str>) -> String {
    serde_json::json!({
        "length": observations.len(),
        "maxPageLimit": 2500,
        "totalRecords": observations.len(),
        "data": observations,
        "requestPayload": {
            "structure": {
                "date": "date",
                "newDeaths28DaysByPublishDate": "newDeaths28DaysByPublishDate"
            },
            "filters": [
                {"identifier": "areaType", "operator": "=", "value": "nation"},
                {"identifier": "areaName", "operator": "=", "value": "England"}
            ],
            "page": 1
        },
        "pagination": {
            "current": "/v1/data?page=1",
            "next": next,
            "previous": null,
            "first": "/v1/data?page=1",
            "last": "/v1/data?page=1"
        }
    })
    .to_string()
}

/// Create a temporary directory for tests that automatically cleans up.
#[cfg(feature = "tempfile")]
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Assert that two floating point numbers are approximately equal within a tolerance.
pub fn assert_approx_eq(left: f64, right: f64, tolerance: f64) {
    let diff = (left - right).abs();
    assert!(
        diff <= tolerance,
        "assertion failed: `{left}` is not approximately equal to `{right}` (tolerance: {tolerance}, diff: {diff})"
    );
}
