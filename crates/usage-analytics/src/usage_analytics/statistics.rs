//! Baseline statistics over consumption readings
//!
//! Mean, population standard deviation and median of reading quantities. Very small
//! samples fall back to a minimum-observed baseline so callers never divide by a
//! degenerate variance.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::readings::ConsumptionReading;
use serde::{Deserialize, Serialize};
use statistical::{mean, median, population_standard_deviation};

/// Which statistic the baseline was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineKind {
    /// Mean and population standard deviation
    Statistical,
    /// Minimum observed value; too few samples for a spread
    MinimumObserved,
}

/// Statistical reference point for anomaly detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    /// Baseline kind
    pub kind: BaselineKind,
    /// Mean (minimum observed for [`BaselineKind::MinimumObserved`])
    pub mean: f64,
    /// Population standard deviation (0 for [`BaselineKind::MinimumObserved`])
    pub standard_deviation: f64,
    /// Median
    pub median: f64,
    /// Smallest reading
    pub minimum: f64,
    /// Largest reading
    pub maximum: f64,
    /// Upper bound of normal consumption
    pub max_normal: f64,
    /// Readings the baseline was computed from
    pub sample_count: usize,
}

impl BaselineStats {
    /// Sigma multiples `value` lies above the mean, `None` without a spread
    pub fn sigmas_above_mean(&self, value: f64) -> Option<f64> {
        if self.kind != BaselineKind::Statistical || self.standard_deviation <= 0.0 {
            return None;
        }
        Some((value - self.mean) / self.standard_deviation)
    }
}

/// Baseline statistics calculator
pub struct StatisticsCalculator {
    /// Samples required for a mean/stddev baseline
    min_statistical_samples: usize,
    /// Sigma multiple defining `max_normal`
    spike_sigma: f64,
}

impl StatisticsCalculator {
    /// Create a new statistics calculator
    pub fn new(min_statistical_samples: usize, spike_sigma: f64) -> Self {
        Self {
            min_statistical_samples,
            spike_sigma,
        }
    }

    /// Calculate the baseline for `readings`
    pub fn calculate_baseline(
        &self,
        readings: &[ConsumptionReading],
    ) -> AnalyticsResult<BaselineStats> {
        let values: Vec<f64> = readings.iter().map(|r| r.kilowatt_hours).collect();

        if values.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }

        let minimum = values.iter().copied().fold(f64::INFINITY, f64::min);
        let maximum = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let median = median(&values);

        if values.len() < self.min_statistical_samples.max(2) {
            return Ok(BaselineStats {
                kind: BaselineKind::MinimumObserved,
                mean: minimum,
                standard_deviation: 0.0,
                median,
                minimum,
                maximum,
                max_normal: minimum,
                sample_count: values.len(),
            });
        }

        let avg = mean(&values);
        let std_dev = population_standard_deviation(&values, Some(avg));

        Ok(BaselineStats {
            kind: BaselineKind::Statistical,
            mean: avg,
            standard_deviation: std_dev,
            median,
            minimum,
            maximum,
            max_normal: avg + self.spike_sigma * std_dev,
            sample_count: values.len(),
        })
    }
}

impl Default for StatisticsCalculator {
    fn default() -> Self {
        Self::new(3, 2.0)
    }
}

/// Hour-of-day (0-23) average consumption, only for hours with readings
pub fn hourly_averages(readings: &[ConsumptionReading]) -> Vec<(u32, f64)> {
    use chrono::Timelike;

    let mut sums = [0.0_f64; 24];
    let mut counts = [0_usize; 24];

    for reading in readings {
        let hour = reading.timestamp.hour() as usize;
        sums[hour] += reading.kilowatt_hours;
        counts[hour] += 1;
    }

    (0..24)
        .filter(|&h| counts[h] > 0)
        .map(|h| (h as u32, sums[h] / counts[h] as f64))
        .collect()
}

/// Least-squares slope of `values` against their index
pub fn linear_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
