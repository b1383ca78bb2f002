//! Core types and data structures for usage analytics
//!
//! Periods, patterns, trends, anomalies and reports produced by the engine. Reports own
//! copies of everything they reference and are never mutated once built.

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::readings::{ConsumptionReading, ConsumptionSummary};

/// Step between readings within a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeGranularity {
    /// One reading per hour
    Hourly,
    /// One reading per day
    Daily,
    /// One reading per week
    Weekly,
    /// One reading per calendar month
    Monthly,
}

impl TimeGranularity {
    /// Advance `timestamp` by one step, `None` on calendar overflow
    pub fn advance(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeGranularity::Hourly => timestamp.checked_add_signed(Duration::hours(1)),
            TimeGranularity::Daily => timestamp.checked_add_signed(Duration::days(1)),
            TimeGranularity::Weekly => timestamp.checked_add_signed(Duration::weeks(1)),
            TimeGranularity::Monthly => timestamp.checked_add_months(Months::new(1)),
        }
    }

    fn step_seconds(&self) -> Option<i64> {
        match self {
            TimeGranularity::Hourly => Some(3_600),
            TimeGranularity::Daily => Some(86_400),
            TimeGranularity::Weekly => Some(604_800),
            TimeGranularity::Monthly => None,
        }
    }
}

impl std::fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeGranularity::Hourly => write!(f, "hourly"),
            TimeGranularity::Daily => write!(f, "daily"),
            TimeGranularity::Weekly => write!(f, "weekly"),
            TimeGranularity::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for TimeGranularity {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(TimeGranularity::Hourly),
            "daily" => Ok(TimeGranularity::Daily),
            "weekly" => Ok(TimeGranularity::Weekly),
            "monthly" => Ok(TimeGranularity::Monthly),
            _ => Err(AnalyticsError::UnsupportedGranularity {
                value: s.to_string(),
            }),
        }
    }
}

/// Largest number of granularity steps a single period may span
pub const MAX_PERIOD_STEPS: u64 = 1_000_000;

/// Bounded time range plus the granularity readings are stepped at.
///
/// Two periods are equal iff start, end and granularity all match, so periods with the
/// same bounds but different granularity occupy separate cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisPeriod {
    /// Inclusive start
    pub start_date: DateTime<Utc>,
    /// Inclusive end
    pub end_date: DateTime<Utc>,
    /// Reading step
    pub granularity: TimeGranularity,
}

impl AnalysisPeriod {
    /// Create a validated period
    pub fn new(
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        granularity: TimeGranularity,
    ) -> AnalyticsResult<Self> {
        let period = Self {
            start_date,
            end_date,
            granularity,
        };
        period.validate()?;
        Ok(period)
    }

    /// Reject periods that start after they end or span more than [`MAX_PERIOD_STEPS`]
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.start_date > self.end_date {
            return Err(self.invalid("start is after end"));
        }

        let steps = self.step_count();
        if steps > MAX_PERIOD_STEPS {
            return Err(self.invalid(&format!(
                "{steps} {} steps exceeds the limit of {MAX_PERIOD_STEPS}",
                self.granularity
            )));
        }
        Ok(())
    }

    /// Number of steps from start to end inclusive, computed without enumerating them.
    ///
    /// Monthly periods count calendar months touched, so the value is an upper bound when
    /// the end day falls before the start day.
    pub fn step_count(&self) -> u64 {
        if self.start_date > self.end_date {
            return 0;
        }

        let span = match self.granularity.step_seconds() {
            Some(step) => (self.end_date - self.start_date).num_seconds() / step,
            None => {
                let years = i64::from(self.end_date.year() - self.start_date.year());
                years * 12 + i64::from(self.end_date.month()) - i64::from(self.start_date.month())
            }
        };

        span.max(0) as u64 + 1
    }

    fn invalid(&self, reason: &str) -> AnalyticsError {
        AnalyticsError::InvalidPeriod {
            start: self.start_date,
            end: self.end_date,
            reason: reason.to_string(),
        }
    }

    /// Whether `timestamp` lies within the period, bounds included
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start_date && *timestamp <= self.end_date
    }

    /// Every step from start to end inclusive
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut timestamps = Vec::new();
        let mut current = Some(self.start_date);

        while let Some(ts) = current {
            if ts > self.end_date {
                break;
            }
            timestamps.push(ts);
            current = self.granularity.advance(ts);
        }

        timestamps
    }
}

/// Consumption pattern classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternType {
    /// Recurring daily/weekly cycle
    Cyclical,
    /// Seasonal variation
    Seasonal,
    /// Peak-hours usage
    PeakUsage,
    /// Off-peak usage
    OffPeakUsage,
    /// Always-on baseline consumption
    Baseline,
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternType::Cyclical => write!(f, "Cyclical"),
            PatternType::Seasonal => write!(f, "Seasonal"),
            PatternType::PeakUsage => write!(f, "Peak Usage"),
            PatternType::OffPeakUsage => write!(f, "Off-Peak Usage"),
            PatternType::Baseline => write!(f, "Baseline"),
        }
    }
}

/// A classified, recurring shape of consumption over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionPattern {
    /// Pattern ID
    pub id: Uuid,
    /// Pattern type
    pub pattern_type: PatternType,
    /// Description
    pub description: String,
    /// Confidence (0-1)
    pub confidence: f64,
    /// Customers the pattern was observed for
    pub affected_customers: Vec<String>,
    /// Readings the pattern was derived from
    pub readings: Vec<ConsumptionReading>,
}

/// Trend direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    /// Increasing consumption
    Increasing,
    /// Decreasing consumption
    Decreasing,
    /// Stable consumption
    Stable,
    /// No consistent direction
    Fluctuating,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::Fluctuating => write!(f, "fluctuating"),
        }
    }
}

/// Slice of consumption a trend describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendScope {
    /// All consumption
    Overall,
    /// Peak-hours consumption
    PeakHours,
    /// Off-peak consumption
    OffPeakHours,
}

impl std::fmt::Display for TrendScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendScope::Overall => write!(f, "Overall"),
            TrendScope::PeakHours => write!(f, "Peak hours"),
            TrendScope::OffPeakHours => write!(f, "Off-peak hours"),
        }
    }
}

/// Directional change in consumption over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionTrend {
    /// Trend ID
    pub id: Uuid,
    /// Consumption slice
    pub scope: TrendScope,
    /// Direction
    pub direction: TrendDirection,
    /// Fractional change, always > 0 (0.15 = 15%)
    pub magnitude: f64,
    /// Period analysed
    pub period: AnalysisPeriod,
    /// Description
    pub description: String,
}

/// Anomaly severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnomalySeverity {
    /// Informational
    Low,
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Needs immediate action
    Critical,
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalySeverity::Low => write!(f, "LOW"),
            AnomalySeverity::Medium => write!(f, "MEDIUM"),
            AnomalySeverity::High => write!(f, "HIGH"),
            AnomalySeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Detection rule that produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Readings above mean + 2σ
    Spike,
    /// Hour-of-day averages outside their expected band
    UnusualHourlyPattern,
    /// Consumption outside peak hours
    OffHoursUsage,
}

/// A flagged deviation from expected consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionAnomaly {
    /// Anomaly ID
    pub id: Uuid,
    /// Detection rule
    pub kind: AnomalyKind,
    /// Severity
    pub severity: AnomalySeverity,
    /// Description
    pub description: String,
    /// Detection time
    pub detected_at: DateTime<Utc>,
    /// Readings responsible
    pub affected_readings: Vec<ConsumptionReading>,
}

/// Aggregated analysis for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Report ID
    pub id: Uuid,
    /// Period analysed
    pub period: AnalysisPeriod,
    /// Patterns found
    pub patterns: Vec<ConsumptionPattern>,
    /// Trends found
    pub trends: Vec<ConsumptionTrend>,
    /// Anomalies over the patterns' readings
    pub anomalies: Vec<ConsumptionAnomaly>,
    /// Generated timestamp
    pub generated_at: DateTime<Utc>,
}

impl UsageReport {
    /// Distinct readings referenced by the report's patterns, in first-seen order
    pub fn pattern_readings(&self) -> Vec<ConsumptionReading> {
        distinct_readings(&self.patterns)
    }

    /// Peak/off-peak totals, each reading counted once.
    ///
    /// A cyclical pattern already covers the full daily cycle, so its readings are used
    /// when present. Otherwise the distinct pattern readings are summed.
    pub fn consumption_summary(&self) -> ConsumptionSummary {
        match self
            .patterns
            .iter()
            .find(|p| p.pattern_type == PatternType::Cyclical)
        {
            Some(cyclical) => {
                ConsumptionSummary::from_readings(&distinct_readings(std::slice::from_ref(cyclical)))
            }
            None => ConsumptionSummary::from_readings(&self.pattern_readings()),
        }
    }

    /// Highest anomaly severity, if any
    pub fn max_severity(&self) -> Option<AnomalySeverity> {
        self.anomalies.iter().map(|a| a.severity).max()
    }
}

/// Readings across `patterns` with duplicates removed, in first-seen order.
///
/// Patterns overlap (a peak reading belongs to both the peak and the cyclical pattern), so
/// a plain flatten would count shared readings more than once.
pub fn distinct_readings(patterns: &[ConsumptionPattern]) -> Vec<ConsumptionReading> {
    let mut seen = HashSet::new();
    patterns
        .iter()
        .flat_map(|p| p.readings.iter().copied())
        .filter(|r| seen.insert((r.timestamp, r.kilowatt_hours.to_bits(), r.is_peak_hours)))
        .collect()
}

/// Engine counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsMetrics {
    /// Reports generated
    pub reports_generated: u64,
    /// Pattern computations (cache misses)
    pub pattern_computations: u64,
    /// Trend computations (cache misses)
    pub trend_computations: u64,
    /// Pattern/trend cache hits
    pub cache_hits: u64,
    /// Detection calls
    pub detection_runs: u64,
    /// Anomalies detected, by severity
    pub anomalies_by_severity: HashMap<AnomalySeverity, u64>,
    /// Successful observer deliveries
    pub notifications_delivered: u64,
    /// Observer failures
    pub notification_failures: u64,
}
