//! Rolling-average transform over the raw observations.

use chrono::NaiveDate;
use deathwatch_common::{DeathwatchError, LatestFigures, Observation, Result, Series, SeriesRow};
use tracing::debug;

/// Rows in the trailing average window.
pub const ROLLING_WINDOW: usize = 7;

/// The averaged series together with the figures of its last row.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragedSeries {
    /// Sorted observations with their rolling averages.
    pub series: Series,
    /// Figures taken from the last row.
    pub latest: LatestFigures,
}

/// Trailing mean over `window` rows.
///
/// Rows before the window fills, and windows containing a missing value,
/// yield `None`. Gaps in the dates are not detected: the window always
/// spans the previous `window` rows.
pub fn rolling_mean(values: &[Option<i64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|end| {
            if window == 0 || end + 1 < window {
                return None;
            }
            values[end + 1 - window..=end]
                .iter()
                .copied()
                .sum::<Option<i64>>()
                .map(|sum| sum as f64 / window as f64)
        })
        .collect()
}

/// Sorts the observations by date and derives the 7-day average.
///
/// Fails when there is nothing to average or the last row has no
/// average (fewer than seven rows, or a missing value in the final
/// window).
pub fn compute_average(mut observations: Vec<Observation>) -> Result<AveragedSeries> {
    if observations.is_empty() {
        return Err(DeathwatchError::data("no observations to average"));
    }

    observations.sort_by_key(|obs| obs.date);

    let counts: Vec<Option<i64>> = observations.iter().map(|obs| obs.new_deaths).collect();
    let averages = rolling_mean(&counts, ROLLING_WINDOW);

    let rows: Vec<SeriesRow> = observations
        .into_iter()
        .zip(averages)
        .map(|(observation, seven_day_average)| SeriesRow {
            observation,
            seven_day_average,
        })
        .collect();
    let series = Series::from_sorted_rows(rows);

    let last = series
        .latest()
        .ok_or_else(|| DeathwatchError::data("no observations to average"))?;
    let average = last.seven_day_average.ok_or_else(|| {
        DeathwatchError::data(format!(
            "no {ROLLING_WINDOW}-day average for {} ({} rows available)",
            last.observation.date,
            series.len()
        ))
    })?;

    let latest = LatestFigures {
        average: average.trunc() as i64,
        date: last.observation.date,
        daily_deaths: last.observation.new_deaths,
    };
    debug!(
        average = latest.average,
        date = %latest.date,
        rows = series.len(),
        "Computed rolling average"
    );

    Ok(AveragedSeries { series, latest })
}

/// Whether the newest observation is dated `today`.
pub fn is_current(series: &Series, today: NaiveDate) -> bool {
    series
        .latest()
        .is_some_and(|row| row.observation.date == today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deathwatch_common::test_utils::{
        assert_approx_eq, daily_observations, first_week_of_2023, mock_date,
    };

    #[test]
    fn test_first_week_average_is_forty() {
        let averaged = compute_average(first_week_of_2023()).unwrap();
        let last = averaged.series.latest().unwrap();
        assert_eq!(last.observation.date, mock_date(2023, 1, 7));
        assert_approx_eq(last.seven_day_average.unwrap(), 40.0, 1e-9);
        assert_eq!(averaged.latest.average, 40);
        assert_eq!(averaged.latest.daily_deaths, Some(70));
        assert_eq!(averaged.latest.date_label(), "2023-01-07");
    }

    #[test]
    fn test_first_six_rows_have_no_average() {
        let averaged = compute_average(first_week_of_2023()).unwrap();
        let rows = averaged.series.rows();
        assert!(rows[..6].iter().all(|row| row.seven_day_average.is_none()));
        assert!(rows[6].seven_day_average.is_some());
    }

    #[test]
    fn test_window_slides_over_trailing_rows() {
        let observations =
            daily_observations(mock_date(2023, 1, 1), &[10, 20, 30, 40, 50, 60, 70, 80, 93]);
        let averaged = compute_average(observations).unwrap();
        let rows = averaged.series.rows();
        assert_approx_eq(rows[7].seven_day_average.unwrap(), 50.0, 1e-9);
        // (30 + 40 + 50 + 60 + 70 + 80 + 93) / 7 = 60.43
        assert_approx_eq(rows[8].seven_day_average.unwrap(), 423.0 / 7.0, 1e-9);
        assert_eq!(averaged.latest.average, 60);
    }

    #[test]
    fn test_unsorted_input_is_sorted_by_date() {
        let mut observations = first_week_of_2023();
        observations.reverse();
        let averaged = compute_average(observations).unwrap();
        let dates: Vec<_> = averaged
            .series
            .rows()
            .iter()
            .map(|row| row.observation.date)
            .collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(averaged.latest.average, 40);
    }

    #[test]
    fn test_fewer_than_seven_rows_fails() {
        let observations = daily_observations(mock_date(2023, 1, 1), &[1, 2, 3]);
        let err = compute_average(observations).unwrap_err();
        assert!(matches!(err, DeathwatchError::Data { .. }));
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(compute_average(Vec::new()).is_err());
    }

    #[test]
    fn test_missing_value_blanks_the_windows_containing_it() {
        let values = [
            Some(7),
            Some(7),
            None,
            Some(7),
            Some(7),
            Some(7),
            Some(7),
            Some(7),
            Some(7),
            Some(7),
        ];
        let means = rolling_mean(&values, 7);
        assert_eq!(means[6], None);
        assert_eq!(means[8], None);
        assert_eq!(means[9], Some(7.0));
    }

    #[test]
    fn test_gap_in_dates_is_not_flagged() {
        let mut observations = first_week_of_2023();
        // Drop 2023-01-04: the window now reaches back to 2023-01-01 for the 8th.
        observations.remove(3);
        observations.push(Observation::new(mock_date(2023, 1, 8), 80));
        let averaged = compute_average(observations).unwrap();
        assert_eq!(averaged.latest.date, mock_date(2023, 1, 8));
        // (10 + 20 + 30 + 50 + 60 + 70 + 80) / 7 = 45.71
        assert_eq!(averaged.latest.average, 45);
    }

    #[test]
    fn test_is_current() {
        let averaged = compute_average(first_week_of_2023()).unwrap();
        assert!(is_current(&averaged.series, mock_date(2023, 1, 7)));
        assert!(!is_current(&averaged.series, mock_date(2023, 1, 8)));
        assert!(!is_current(&Series::default(), mock_date(2023, 1, 7)));
    }
}
