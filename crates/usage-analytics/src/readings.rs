//! Consumption readings and the sources that supply them
//!
//! Readings are produced by a billing/metering collaborator. The engine pulls them through
//! the [`ReadingSource`] trait, so production deployments can inject a real feed while tests
//! supply fixed data. [`SyntheticReadingSource`] stands in for a meter feed and generates a
//! deterministic, jittered series for any period.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::usage_analytics::config::SyntheticReadingConfig;
use crate::usage_analytics::types::AnalysisPeriod;
use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A single timestamped energy measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionReading {
    /// Measurement time
    pub timestamp: DateTime<Utc>,
    /// Energy consumed, never negative
    pub kilowatt_hours: f64,
    /// Whether the reading falls in the tariff's peak hours
    pub is_peak_hours: bool,
}

impl ConsumptionReading {
    /// Create a reading, rejecting negative or non-finite quantities
    pub fn new(
        timestamp: DateTime<Utc>,
        kilowatt_hours: f64,
        is_peak_hours: bool,
    ) -> AnalyticsResult<Self> {
        if !kilowatt_hours.is_finite() || kilowatt_hours < 0.0 {
            return Err(AnalyticsError::InvalidReading {
                details: format!("kilowatt_hours must be finite and >= 0, got {kilowatt_hours}"),
            });
        }

        Ok(Self {
            timestamp,
            kilowatt_hours,
            is_peak_hours,
        })
    }
}

/// Shape of the readings requested from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadProfile {
    /// Peak-hours consumption only
    Peak,
    /// Off-peak consumption only
    OffPeak,
    /// Full daily cycle, peak during the tariff's peak hours
    Cyclical,
}

impl LoadProfile {
    fn seed_salt(self) -> u64 {
        match self {
            LoadProfile::Peak => 0x5045_414b,
            LoadProfile::OffPeak => 0x4f46_4650,
            LoadProfile::Cyclical => 0x4359_434c,
        }
    }
}

/// Supplies consumption readings for a period
pub trait ReadingSource: Send + Sync {
    /// Readings in `period` matching `profile`
    fn readings(
        &self,
        period: &AnalysisPeriod,
        profile: LoadProfile,
    ) -> AnalyticsResult<Vec<ConsumptionReading>>;

    /// Customers whose readings are covered by `period`
    fn customer_ids(&self, _period: &AnalysisPeriod) -> Vec<String> {
        Vec::new()
    }
}

/// Deterministic pseudorandom stand-in for a metering feed
#[derive(Debug, Clone, Default)]
pub struct SyntheticReadingSource {
    config: SyntheticReadingConfig,
}

impl SyntheticReadingSource {
    /// Create a synthetic source
    pub fn new(config: SyntheticReadingConfig) -> Self {
        Self { config }
    }

    fn is_peak_hour(&self, timestamp: &DateTime<Utc>) -> bool {
        (self.config.peak_start_hour..=self.config.peak_end_hour).contains(&timestamp.hour())
    }

    fn jittered(&self, rng: &mut StdRng, base: f64) -> f64 {
        let jitter = self.config.jitter_fraction;
        if jitter <= 0.0 {
            return base;
        }
        (base * (1.0 + rng.gen_range(-jitter..=jitter))).max(0.0)
    }
}

impl ReadingSource for SyntheticReadingSource {
    fn readings(
        &self,
        period: &AnalysisPeriod,
        profile: LoadProfile,
    ) -> AnalyticsResult<Vec<ConsumptionReading>> {
        period.validate()?;

        let mut rng = StdRng::seed_from_u64(period_seed(period) ^ profile.seed_salt());

        let readings = period
            .timestamps()
            .into_iter()
            .map(|timestamp| {
                let is_peak = match profile {
                    LoadProfile::Peak => true,
                    LoadProfile::OffPeak => false,
                    LoadProfile::Cyclical => self.is_peak_hour(&timestamp),
                };
                let base = if is_peak {
                    self.config.peak_base_kwh
                } else {
                    self.config.off_peak_base_kwh
                };

                ConsumptionReading {
                    timestamp,
                    kilowatt_hours: self.jittered(&mut rng, base),
                    is_peak_hours: is_peak,
                }
            })
            .collect();

        Ok(readings)
    }
}

/// Serves a fixed set of readings, filtered by period and profile
#[derive(Debug, Clone, Default)]
pub struct FixedReadingSource {
    readings: Vec<ConsumptionReading>,
    customers: Vec<String>,
}

impl FixedReadingSource {
    /// Create a source over `readings`
    pub fn new(readings: Vec<ConsumptionReading>) -> Self {
        Self {
            readings,
            customers: Vec::new(),
        }
    }

    /// Attach the customers the readings belong to
    pub fn with_customers(mut self, customers: Vec<String>) -> Self {
        self.customers = customers;
        self
    }
}

impl ReadingSource for FixedReadingSource {
    fn readings(
        &self,
        period: &AnalysisPeriod,
        profile: LoadProfile,
    ) -> AnalyticsResult<Vec<ConsumptionReading>> {
        period.validate()?;

        Ok(self
            .readings
            .iter()
            .filter(|r| period.contains(&r.timestamp))
            .filter(|r| match profile {
                LoadProfile::Peak => r.is_peak_hours,
                LoadProfile::OffPeak => !r.is_peak_hours,
                LoadProfile::Cyclical => true,
            })
            .copied()
            .collect())
    }

    fn customer_ids(&self, _period: &AnalysisPeriod) -> Vec<String> {
        self.customers.clone()
    }
}

/// Peak/off-peak totals over a set of readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSummary {
    /// Total kWh
    pub total_kilowatt_hours: f64,
    /// kWh consumed during peak hours
    pub peak_kilowatt_hours: f64,
    /// kWh consumed outside peak hours
    pub off_peak_kilowatt_hours: f64,
    /// Number of readings summarised
    pub reading_count: usize,
}

impl ConsumptionSummary {
    /// Summarise `readings`
    pub fn from_readings(readings: &[ConsumptionReading]) -> Self {
        readings.iter().fold(Self::default(), |mut acc, r| {
            acc.total_kilowatt_hours += r.kilowatt_hours;
            if r.is_peak_hours {
                acc.peak_kilowatt_hours += r.kilowatt_hours;
            } else {
                acc.off_peak_kilowatt_hours += r.kilowatt_hours;
            }
            acc.reading_count += 1;
            acc
        })
    }
}

fn period_seed(period: &AnalysisPeriod) -> u64 {
    let start = period.start_date.timestamp() as u64;
    let end = period.end_date.timestamp() as u64;
    start
        .wrapping_mul(0x9e37_79b9_7f4a_7c15)
        .rotate_left(17)
        ^ end.wrapping_mul(0xc2b2_ae3d_27d4_eb4f)
        ^ period.granularity as u64
}
