//! Domain types shared by the fetch, transform, render and publish stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One day of the dashboard's `newDeaths28DaysByPublishDate` metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Publication date.
    pub date: NaiveDate,
    /// Deaths within 28 days of a positive test, by publish date.
    /// The API reports `null` for days without a figure.
    #[serde(rename = "newDeaths28DaysByPublishDate")]
    pub new_deaths: Option<i64>,
}

impl Observation {
    /// Creates an observation with a known count.
    pub const fn new(date: NaiveDate, new_deaths: i64) -> Self {
        Self {
            date,
            new_deaths: Some(new_deaths),
        }
    }
}

/// An observation augmented with its trailing 7-day average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesRow {
    /// The underlying observation.
    pub observation: Observation,
    /// Mean of the trailing window, absent until the window is full.
    #[serde(rename = "7DayAverage")]
    pub seven_day_average: Option<f64>,
}

/// Observations sorted ascending by date, with rolling averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    rows: Vec<SeriesRow>,
}

impl Series {
    /// Wraps rows that are already sorted ascending by date.
    pub const fn from_sorted_rows(rows: Vec<SeriesRow>) -> Self {
        Self { rows }
    }

    /// All rows, oldest first.
    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    /// The most recent row.
    pub fn latest(&self) -> Option<&SeriesRow> {
        self.rows.last()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(date, average)` pairs for the rows that have an average.
    pub fn averages(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.rows
            .iter()
            .filter_map(|row| row.seven_day_average.map(|avg| (row.observation.date, avg)))
    }
}

/// Figures taken from the last row of the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestFigures {
    /// 7-day average, truncated towards zero.
    pub average: i64,
    /// Date of the last observation.
    pub date: NaiveDate,
    /// Count reported on that date.
    pub daily_deaths: Option<i64>,
}

impl LatestFigures {
    /// Average as displayed in posts and the chart title.
    pub fn average_label(&self) -> String {
        self.average.to_string()
    }

    /// Date as displayed in posts (`YYYY-MM-DD`).
    pub fn date_label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Count as displayed in posts.
    pub fn daily_deaths_label(&self) -> String {
        self.daily_deaths
            .map_or_else(|| "n/a".to_string(), |count| count.to_string())
    }
}

/// Everything a publisher needs for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPayload {
    /// Latest reported count.
    pub weekly_deaths: String,
    /// Latest 7-day average.
    pub seven_day_average: String,
    /// Date of the latest observation.
    pub last_update_date: String,
    /// Rendered chart.
    pub chart_image: PathBuf,
}

impl PublishPayload {
    /// Builds the payload for the latest figures and a rendered chart.
    pub fn new(latest: &LatestFigures, chart_image: impl Into<PathBuf>) -> Self {
        Self {
            weekly_deaths: latest.daily_deaths_label(),
            seven_day_average: latest.average_label(),
            last_update_date: latest.date_label(),
            chart_image: chart_image.into(),
        }
    }
}

impl fmt::Display for PublishPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deaths={} average={} updated={}",
            self.weekly_deaths, self.seven_day_average, self.last_update_date
        )
    }
}
