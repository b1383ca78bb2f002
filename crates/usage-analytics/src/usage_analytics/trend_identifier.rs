//! Trend identification
//!
//! Produces one trend per scope (overall, peak hours, off-peak hours). With
//! [`TrendPolicy::Configured`] direction and magnitude are fixed per scope. With
//! [`TrendPolicy::Derived`] they come from a least-squares fit over the readings the
//! source supplies for the scope.

use crate::error::AnalyticsResult;
use crate::readings::{LoadProfile, ReadingSource};
use crate::usage_analytics::config::{TrendConfig, TrendPolicy};
use crate::usage_analytics::statistics::linear_slope;
use crate::usage_analytics::types::*;
use statistical::{mean, population_standard_deviation};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const TREND_SCOPES: [TrendScope; 3] = [
    TrendScope::Overall,
    TrendScope::PeakHours,
    TrendScope::OffPeakHours,
];

/// Trend identifier
pub struct TrendIdentifier {
    config: TrendConfig,
    source: Arc<dyn ReadingSource>,
}

impl TrendIdentifier {
    /// Create a new trend identifier
    pub fn new(config: TrendConfig, source: Arc<dyn ReadingSource>) -> Self {
        Self { config, source }
    }

    /// Identify consumption trends for `period`
    pub fn identify(&self, period: &AnalysisPeriod) -> AnalyticsResult<Vec<ConsumptionTrend>> {
        period.validate()?;

        let mut trends = Vec::with_capacity(TREND_SCOPES.len());

        for scope in TREND_SCOPES {
            let (direction, magnitude) = match self.config.policy {
                TrendPolicy::Configured => self.configured(scope),
                TrendPolicy::Derived => self.derived(period, scope)?,
            };

            debug!("{} trend: {} by {:.1}%", scope, direction, magnitude * 100.0);

            trends.push(ConsumptionTrend {
                id: Uuid::new_v4(),
                scope,
                direction,
                magnitude,
                period: *period,
                description: describe(scope, direction, magnitude),
            });
        }

        Ok(trends)
    }

    fn configured(&self, scope: TrendScope) -> (TrendDirection, f64) {
        match scope {
            TrendScope::Overall => (TrendDirection::Increasing, self.config.overall_magnitude),
            TrendScope::PeakHours => (TrendDirection::Stable, self.config.peak_hours_magnitude),
            TrendScope::OffPeakHours => (
                TrendDirection::Fluctuating,
                self.config.off_peak_hours_magnitude,
            ),
        }
    }

    fn derived(
        &self,
        period: &AnalysisPeriod,
        scope: TrendScope,
    ) -> AnalyticsResult<(TrendDirection, f64)> {
        let profile = match scope {
            TrendScope::Overall => LoadProfile::Cyclical,
            TrendScope::PeakHours => LoadProfile::Peak,
            TrendScope::OffPeakHours => LoadProfile::OffPeak,
        };

        let mut readings = self.source.readings(period, profile)?;
        readings.sort_by_key(|r| r.timestamp);
        let values: Vec<f64> = readings.iter().map(|r| r.kilowatt_hours).collect();

        Ok(classify(&values, &self.config))
    }
}

/// Direction and magnitude of a series under the derived policy
pub fn classify(values: &[f64], config: &TrendConfig) -> (TrendDirection, f64) {
    if values.len() < 2 {
        return (TrendDirection::Stable, config.min_magnitude);
    }

    let avg = mean(values);
    if avg <= 0.0 {
        return (TrendDirection::Stable, config.min_magnitude);
    }

    let change = linear_slope(values) * (values.len() - 1) as f64 / avg;
    let cv = population_standard_deviation(values, Some(avg)) / avg;

    let direction = if cv > config.fluctuation_cv && change.abs() < cv {
        TrendDirection::Fluctuating
    } else if change.abs() < config.stable_band {
        TrendDirection::Stable
    } else if change > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    (direction, change.abs().max(config.min_magnitude))
}

fn describe(scope: TrendScope, direction: TrendDirection, magnitude: f64) -> String {
    format!(
        "{} consumption {} ({:.0}% change)",
        scope,
        direction,
        magnitude * 100.0
    )
}
