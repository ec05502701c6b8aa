//! Exponential weighted smoothing of sensor columns.
//!
//! Recursive: `ewa[i] = alpha * value[i] + (1 - alpha) * ewa[i-1]`, seeded
//! with the first finite sample of each column. `alpha <= 0` disables
//! smoothing entirely. Runs strictly after the full range is assembled and
//! sorted; the recurrence is defined over the whole chronological sequence,
//! not per day.

use crate::domain::TimeSeries;
use tracing::debug;

/// Smooth every value column of the series in place.
pub fn smooth_series(series: &mut TimeSeries, alpha: f64) {
    if alpha <= 0.0 {
        debug!("smoothing disabled (alpha <= 0)");
        return;
    }
    for col in 0..series.columns().len() {
        let smoothed = ewma_of_series(&series.column_values(col), alpha);
        for (row, value) in series.rows_mut().iter_mut().zip(smoothed) {
            row.values[col] = value;
        }
    }
}

/// Compute the exponentially weighted average of one value sequence.
///
/// A NaN sample stays NaN and leaves the running average untouched, so one
/// broken reading cannot taint the rest of the column.
pub fn ewma_of_series(values: &[f64], alpha: f64) -> Vec<f64> {
    if alpha <= 0.0 {
        return values.to_vec();
    }
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    for &value in values {
        if value.is_nan() {
            out.push(f64::NAN);
            continue;
        }
        let ewa = match state {
            None => value,
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
        };
        state = Some(ewa);
        out.push(ewa);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series_of(values: &[[f64; 2]]) -> TimeSeries {
        let mut series = TimeSeries::with_columns(vec!["c0".into(), "c1".into()]);
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        for (i, row) in values.iter().enumerate() {
            series.push_row(base + chrono::Duration::minutes(i as i64), row.to_vec());
        }
        series
    }

    #[test]
    fn zero_alpha_is_identity() {
        let mut series = series_of(&[[10.0, 1.0], [20.0, 2.0]]);
        let before = series.clone();
        smooth_series(&mut series, 0.0);
        assert_eq!(series, before);
    }

    #[test]
    fn alpha_one_keeps_values() {
        assert_eq!(ewma_of_series(&[10.0, 20.0, 5.0], 1.0), [10.0, 20.0, 5.0]);
    }

    #[test]
    fn known_recurrence_values() {
        // alpha 0.5: 10, 0.5*20 + 0.5*10 = 15, 0.5*20 + 0.5*15 = 17.5
        assert_eq!(ewma_of_series(&[10.0, 20.0, 20.0], 0.5), [10.0, 15.0, 17.5]);
    }

    #[test]
    fn nan_passes_through_without_touching_state() {
        let out = ewma_of_series(&[10.0, f64::NAN, 20.0], 0.5);
        assert_eq!(out[0], 10.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 15.0);
    }

    #[test]
    fn leading_nans_seed_on_first_finite_sample() {
        let out = ewma_of_series(&[f64::NAN, f64::NAN, 8.0, 4.0], 0.5);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 8.0);
        assert_eq!(out[3], 6.0);
    }

    #[test]
    fn dampens_single_sample_spikes() {
        let values = [10.0, 10.0, 100.0, 10.0];
        let out = ewma_of_series(&values, 0.2);
        assert!(out[2] < 30.0, "spike should be pulled toward the running mean, got {}", out[2]);
        assert!(out[3] < out[2]);
    }

    #[test]
    fn columns_are_smoothed_independently() {
        let mut series = series_of(&[[10.0, 100.0], [20.0, 100.0]]);
        smooth_series(&mut series, 0.5);
        assert_eq!(series.rows()[1].values, [15.0, 100.0]);
    }
}
