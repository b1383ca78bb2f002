//! Multi-rule anomaly detection over consumption readings
//!
//! Three independent rules run against a shared baseline, each contributing at most one
//! anomaly: consumption spikes, hour-of-day averages outside their expected band, and
//! off-hours usage. Anomalies at or above the notification threshold are delivered to the
//! notifier before detection returns.

use super::config::DetectionConfig;
use super::notifier::{AnomalyNotifier, DispatchOutcome};
use super::statistics::{hourly_averages, BaselineKind, BaselineStats, StatisticsCalculator};
use super::types::*;
use crate::readings::ConsumptionReading;
use chrono::{Timelike, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of one detection call
#[derive(Debug, Clone, Default)]
pub struct DetectionRun {
    /// Anomalies found, in rule order
    pub anomalies: Vec<ConsumptionAnomaly>,
    /// Combined delivery outcome for notified anomalies
    pub dispatch: DispatchOutcome,
}

/// Anomaly detector for consumption readings
pub struct AnomalyDetector {
    /// Configuration
    config: DetectionConfig,
    /// Baseline calculator
    calculator: StatisticsCalculator,
    /// Observer registry
    notifier: Arc<AnomalyNotifier>,
}

impl AnomalyDetector {
    /// Create a new anomaly detector
    pub fn new(config: DetectionConfig, notifier: Arc<AnomalyNotifier>) -> Self {
        let calculator =
            StatisticsCalculator::new(config.min_statistical_samples, config.spike_sigma);
        Self {
            config,
            calculator,
            notifier,
        }
    }

    /// Detect anomalies in `readings` and notify observers
    pub fn detect(&self, readings: &[ConsumptionReading]) -> DetectionRun {
        let usable: Vec<ConsumptionReading> = readings
            .iter()
            .filter(|r| r.kilowatt_hours.is_finite() && r.kilowatt_hours >= 0.0)
            .copied()
            .collect();

        if usable.len() < readings.len() {
            warn!(
                "Skipping {} readings with invalid consumption",
                readings.len() - usable.len()
            );
        }

        // Empty input is resolved here; the calculator would report EmptyInput.
        let baseline = match self.calculator.calculate_baseline(&usable) {
            Ok(baseline) => baseline,
            Err(_) => return DetectionRun::default(),
        };

        debug!(
            "Detection baseline over {} readings: mean={:.2} σ={:.2} ({:?})",
            baseline.sample_count, baseline.mean, baseline.standard_deviation, baseline.kind
        );

        let anomalies: Vec<ConsumptionAnomaly> = [
            self.detect_spikes(&usable, &baseline),
            self.detect_unusual_hours(&usable, &baseline),
            self.detect_off_hours_usage(&usable),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut dispatch = DispatchOutcome::default();
        for anomaly in &anomalies {
            warn!(
                "Anomaly detected: {:?} severity={} ({})",
                anomaly.kind, anomaly.severity, anomaly.description
            );

            if anomaly.severity >= self.config.notify_min_severity {
                let outcome = self.notifier.dispatch(anomaly);
                dispatch.delivered += outcome.delivered;
                dispatch.failed += outcome.failed;
            }
        }

        DetectionRun {
            anomalies,
            dispatch,
        }
    }

    fn detect_spikes(
        &self,
        readings: &[ConsumptionReading],
        baseline: &BaselineStats,
    ) -> Option<ConsumptionAnomaly> {
        if baseline.kind != BaselineKind::Statistical || baseline.standard_deviation <= 0.0 {
            return None;
        }

        let spikes: Vec<ConsumptionReading> = readings
            .iter()
            .filter(|r| r.kilowatt_hours > baseline.max_normal)
            .copied()
            .collect();

        if spikes.is_empty() {
            return None;
        }

        let worst = spikes
            .iter()
            .map(|r| r.kilowatt_hours)
            .fold(f64::NEG_INFINITY, f64::max);
        let z = baseline.sigmas_above_mean(worst)?;

        let severity = if z >= self.config.critical_sigma {
            AnomalySeverity::Critical
        } else if z >= self.config.high_sigma {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };

        Some(anomaly(
            AnomalyKind::Spike,
            severity,
            format!(
                "{} readings above {:.2} kWh; peak {:.2} kWh is {:.1}σ above mean {:.2} kWh",
                spikes.len(),
                baseline.max_normal,
                worst,
                z,
                baseline.mean
            ),
            spikes,
        ))
    }

    fn detect_unusual_hours(
        &self,
        readings: &[ConsumptionReading],
        baseline: &BaselineStats,
    ) -> Option<ConsumptionAnomaly> {
        let unusual_hours: Vec<u32> = hourly_averages(readings)
            .into_iter()
            .filter(|&(hour, average)| {
                let (low, high) = self.expected_band(hour);
                let (low, high) = (low * baseline.mean, high * baseline.mean);
                average < low || average > high
            })
            .map(|(hour, _)| hour)
            .collect();

        if unusual_hours.is_empty() {
            return None;
        }

        let severity = if unusual_hours.len() > self.config.high_unusual_hours {
            AnomalySeverity::High
        } else if unusual_hours.len() > self.config.medium_unusual_hours {
            AnomalySeverity::Medium
        } else {
            AnomalySeverity::Low
        };

        let affected: Vec<ConsumptionReading> = readings
            .iter()
            .filter(|r| unusual_hours.contains(&r.timestamp.hour()))
            .copied()
            .collect();

        Some(anomaly(
            AnomalyKind::UnusualHourlyPattern,
            severity,
            format!(
                "{} hours of the day outside their expected consumption band: {:?}",
                unusual_hours.len(),
                unusual_hours
            ),
            affected,
        ))
    }

    fn detect_off_hours_usage(
        &self,
        readings: &[ConsumptionReading],
    ) -> Option<ConsumptionAnomaly> {
        let off_hours: Vec<ConsumptionReading> = readings
            .iter()
            .filter(|r| !r.is_peak_hours && r.kilowatt_hours > 0.0)
            .copied()
            .collect();

        if off_hours.is_empty() {
            return None;
        }

        let total: f64 = off_hours.iter().map(|r| r.kilowatt_hours).sum();
        Some(anomaly(
            AnomalyKind::OffHoursUsage,
            AnomalySeverity::Low,
            format!(
                "{:.2} kWh consumed across {} off-hours readings",
                total,
                off_hours.len()
            ),
            off_hours,
        ))
    }

    /// Expected hourly average band as fractions of the mean
    fn expected_band(&self, hour: u32) -> (f64, f64) {
        match hour {
            9..=17 => self.config.business_band,
            6..=8 | 18..=22 => self.config.shoulder_band,
            _ => self.config.night_band,
        }
    }
}

fn anomaly(
    kind: AnomalyKind,
    severity: AnomalySeverity,
    description: String,
    affected_readings: Vec<ConsumptionReading>,
) -> ConsumptionAnomaly {
    ConsumptionAnomaly {
        id: Uuid::new_v4(),
        kind,
        severity,
        description,
        detected_at: Utc::now(),
        affected_readings,
    }
}
