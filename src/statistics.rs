//! Summary statistics over numeric series.
//!
//! [`summarize`] reduces a series (per-frame VMAF scores, per-frame PSNR
//! values, per-window bitrates) to a [`StatSummary`]: mean, population
//! standard deviation and the 0th/10th/50th/90th percentiles.
//!
//! Percentiles use linear interpolation between order statistics: for a
//! sorted series `x` of length `n` and quantile `q`, the position is
//! `h = (n - 1) * q` and the value is
//! `x[⌊h⌋] + (h - ⌊h⌋) * (x[⌊h⌋ + 1] - x[⌊h⌋])`.
//!
//! # Example
//!
//! ```
//! use vqscore::summarize;
//!
//! let summary = summarize("vmaf", &[90.0, 92.0, 94.0, 96.0])?;
//! assert_eq!(summary.mean, 93.0);
//! assert_eq!(summary.p50, 93.0);
//! # Ok::<(), vqscore::ScoreError>(())
//! ```

use serde::Serialize;

use crate::error::ScoreError;

/// Reduction of a non-empty numeric series.
///
/// `p0 <= p10 <= p50 <= p90` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSummary {
    /// Minimum (0th percentile).
    pub p0: f64,
    /// 10th percentile.
    pub p10: f64,
    /// Median.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// Population standard deviation.
    pub stddev: f64,
    /// Arithmetic mean.
    pub mean: f64,
}

/// Summarize `series`.
///
/// `metric` only names the series in the error.
///
/// # Errors
///
/// [`ScoreError::EmptySeries`] if `series` is empty.
pub fn summarize(metric: &str, series: &[f64]) -> Result<StatSummary, ScoreError> {
    if series.is_empty() {
        return Err(ScoreError::empty_series(metric));
    }

    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = mean(&sorted);
    Ok(StatSummary {
        p0: quantile(&sorted, 0.0),
        p10: quantile(&sorted, 0.1),
        p50: quantile(&sorted, 0.5),
        p90: quantile(&sorted, 0.9),
        stddev: population_stddev(&sorted, mean),
        mean,
    })
}

/// Quantile `q` (clamped to `[0, 1]`) of an ascending, non-empty series,
/// linearly interpolated between the two nearest order statistics.
///
/// Returns `NaN` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = position - lower as f64;
            sorted[lower] + fraction * (sorted[upper] - sorted[lower])
        }
    }
}

fn mean(series: &[f64]) -> f64 {
    series.iter().sum::<f64>() / series.len() as f64
}

fn population_stddev(series: &[f64], mean: f64) -> f64 {
    let variance =
        series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / series.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_series_is_an_error() {
        let error = summarize("bitrate", &[]).unwrap_err();
        assert!(matches!(error, ScoreError::EmptySeries { ref metric } if metric == "bitrate"));
    }

    #[test]
    fn single_value() {
        let summary = summarize("vmaf", &[42.0]).unwrap();
        assert_eq!(summary.p0, 42.0);
        assert_eq!(summary.p90, 42.0);
        assert_eq!(summary.stddev, 0.0);
        assert_eq!(summary.mean, 42.0);
    }

    #[test]
    fn interpolated_percentiles() {
        // numpy.quantile([1, 2, 3, 4], [0, .1, .5, .9]) -> 1.0, 1.3, 2.5, 3.7
        let summary = summarize("x", &[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!(close(summary.p0, 1.0));
        assert!(close(summary.p10, 1.3));
        assert!(close(summary.p50, 2.5));
        assert!(close(summary.p90, 3.7));
        assert!(close(summary.mean, 2.5));
        assert!(close(summary.stddev, 1.25_f64.sqrt()));
    }

    #[test]
    fn odd_length_median_is_middle_element() {
        let summary = summarize("x", &[9.0, 1.0, 5.0, 7.0, 3.0]).unwrap();
        assert!(close(summary.p50, 5.0));
    }

    #[test]
    fn quantile_clamps_out_of_range() {
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(quantile(&sorted, -0.5), 1.0);
        assert_eq!(quantile(&sorted, 1.5), 3.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn percentiles_are_ordered() {
        let series: Vec<f64> = (0..97).map(|i| ((i * 37) % 101) as f64 * 0.73).collect();
        let summary = summarize("x", &series).unwrap();
        assert!(summary.p0 <= summary.p10);
        assert!(summary.p10 <= summary.p50);
        assert!(summary.p50 <= summary.p90);
    }
}
