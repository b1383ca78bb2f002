//! Configuration for the usage analytics engine

use crate::error::{AnalyticsError, AnalyticsResult};
use serde::{Deserialize, Serialize};

/// Usage analytics engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Pattern analyzer constants
    pub patterns: PatternConfig,
    /// Trend identifier constants
    pub trends: TrendConfig,
    /// Anomaly detection thresholds
    pub detection: DetectionConfig,
    /// Synthetic reading generation
    pub synthetic: SyntheticReadingConfig,
}

/// Fixed confidence per pattern type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Confidence reported for peak usage patterns
    pub peak_confidence: f64,
    /// Confidence reported for off-peak usage patterns
    pub off_peak_confidence: f64,
    /// Confidence reported for cyclical and seasonal patterns
    pub cyclical_confidence: f64,
    /// Confidence reported for baseline patterns
    pub baseline_confidence: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            peak_confidence: 0.85,
            off_peak_confidence: 0.75,
            cyclical_confidence: 0.75,
            baseline_confidence: 0.90,
        }
    }
}

/// How trend direction and magnitude are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendPolicy {
    /// Fixed direction and magnitude per trend scope
    Configured,
    /// Least-squares fit over the reading source for each scope
    Derived,
}

/// Trend identifier constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Trend policy
    pub policy: TrendPolicy,
    /// Overall consumption change for the configured policy
    pub overall_magnitude: f64,
    /// Peak hours change for the configured policy
    pub peak_hours_magnitude: f64,
    /// Off-peak hours change for the configured policy
    pub off_peak_hours_magnitude: f64,
    /// Fractional change below which a derived trend is stable
    pub stable_band: f64,
    /// Coefficient of variation above which a derived trend is fluctuating
    pub fluctuation_cv: f64,
    /// Lower bound for every reported magnitude
    pub min_magnitude: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            policy: TrendPolicy::Configured,
            overall_magnitude: 0.15,
            peak_hours_magnitude: 0.05,
            off_peak_hours_magnitude: 0.25,
            stable_band: 0.05,
            fluctuation_cv: 0.2,
            min_magnitude: 0.01,
        }
    }
}

/// Anomaly detection thresholds for the multi-rule policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Sample count required for a mean/stddev baseline
    pub min_statistical_samples: usize,
    /// Sigma multiple above the mean that marks a spike
    pub spike_sigma: f64,
    /// Sigma multiple for a HIGH spike
    pub high_sigma: f64,
    /// Sigma multiple for a CRITICAL spike
    pub critical_sigma: f64,
    /// Business hours band as fractions of the mean
    pub business_band: (f64, f64),
    /// Shoulder hours band as fractions of the mean
    pub shoulder_band: (f64, f64),
    /// Night hours band as fractions of the mean
    pub night_band: (f64, f64),
    /// Unusual hour count above which the pattern anomaly is MEDIUM
    pub medium_unusual_hours: usize,
    /// Unusual hour count above which the pattern anomaly is HIGH
    pub high_unusual_hours: usize,
    /// Lowest severity delivered to observers
    pub notify_min_severity: super::types::AnomalySeverity,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_statistical_samples: 3,
            spike_sigma: 2.0,
            high_sigma: 2.5,
            critical_sigma: 3.0,
            business_band: (0.8, 1.2),
            shoulder_band: (0.4, 0.8),
            night_band: (0.0, 0.3),
            medium_unusual_hours: 3,
            high_unusual_hours: 6,
            notify_min_severity: super::types::AnomalySeverity::Critical,
        }
    }
}

/// Synthetic reading generation used when no metering feed is injected
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticReadingConfig {
    /// Base kWh for peak readings
    pub peak_base_kwh: f64,
    /// Base kWh for off-peak readings
    pub off_peak_base_kwh: f64,
    /// Jitter as a fraction of the base, applied symmetrically
    pub jitter_fraction: f64,
    /// First hour (inclusive) flagged as peak
    pub peak_start_hour: u32,
    /// Last hour (inclusive) flagged as peak
    pub peak_end_hour: u32,
}

impl Default for SyntheticReadingConfig {
    fn default() -> Self {
        Self {
            peak_base_kwh: 50.0,
            off_peak_base_kwh: 20.0,
            jitter_fraction: 0.10,
            peak_start_hour: 9,
            peak_end_hour: 17,
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> AnalyticsResult<Self> {
        let config: AnalyticsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> AnalyticsResult<()> {
        let p = &self.patterns;
        for (name, value) in [
            ("peak_confidence", p.peak_confidence),
            ("off_peak_confidence", p.off_peak_confidence),
            ("cyclical_confidence", p.cyclical_confidence),
            ("baseline_confidence", p.baseline_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be between 0 and 1")));
            }
        }

        let t = &self.trends;
        for (name, value) in [
            ("overall_magnitude", t.overall_magnitude),
            ("peak_hours_magnitude", t.peak_hours_magnitude),
            ("off_peak_hours_magnitude", t.off_peak_hours_magnitude),
            ("min_magnitude", t.min_magnitude),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(format!("{name} must be positive")));
            }
        }
        if t.stable_band < 0.0 || t.fluctuation_cv <= 0.0 {
            return Err(invalid(
                "stable_band must be >= 0 and fluctuation_cv > 0".to_string(),
            ));
        }

        let d = &self.detection;
        if d.min_statistical_samples < 1 {
            return Err(invalid(
                "min_statistical_samples must be at least 1".to_string(),
            ));
        }
        let ordered = d.spike_sigma <= d.high_sigma && d.high_sigma <= d.critical_sigma;
        if !(d.spike_sigma > 0.0 && ordered) {
            return Err(invalid(
                "sigma thresholds must satisfy 0 < spike <= high <= critical".to_string(),
            ));
        }
        for (name, (low, high)) in [
            ("business_band", d.business_band),
            ("shoulder_band", d.shoulder_band),
            ("night_band", d.night_band),
        ] {
            if low < 0.0 || low > high {
                return Err(invalid(format!("{name} must satisfy 0 <= low <= high")));
            }
        }
        if d.medium_unusual_hours > d.high_unusual_hours {
            return Err(invalid(
                "medium_unusual_hours must not exceed high_unusual_hours".to_string(),
            ));
        }

        let s = &self.synthetic;
        if s.peak_base_kwh < 0.0 || s.off_peak_base_kwh < 0.0 {
            return Err(invalid("base consumption must not be negative".to_string()));
        }
        if !(0.0..1.0).contains(&s.jitter_fraction) {
            return Err(invalid("jitter_fraction must be in [0, 1)".to_string()));
        }
        if s.peak_start_hour > s.peak_end_hour || s.peak_end_hour > 23 {
            return Err(invalid(
                "peak hours must satisfy start <= end <= 23".to_string(),
            ));
        }

        Ok(())
    }
}

fn invalid(message: String) -> AnalyticsError {
    AnalyticsError::ConfigurationError { message }
}
