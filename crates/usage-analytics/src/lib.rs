//! Usage analytics and anomaly detection for metered electricity consumption
//!
//! This crate provides:
//! - Consumption pattern analysis per analysis period
//! - Overall, peak and off-peak consumption trends
//! - Multi-rule anomaly detection with observer notification
//! - Aggregated usage reports, cached by period and addressable by id

#![warn(missing_docs)]

pub mod error;
pub mod readings;
pub mod usage_analytics;

pub use error::{AnalyticsError, AnalyticsResult};

// Readings
pub use readings::{
    ConsumptionReading, ConsumptionSummary, FixedReadingSource, LoadProfile, ReadingSource,
    SyntheticReadingSource,
};

// Analytics engine
pub use usage_analytics::{
    AnalysisPeriod, AnalyticsConfig, AnalyticsMetrics, AnomalyKind, AnomalyObserver,
    AnomalySeverity, CallbackObserver, ConsumptionAnomaly, ConsumptionPattern, ConsumptionTrend,
    DetectionConfig, ObserverId, PatternConfig, PatternType, SyntheticReadingConfig,
    TimeGranularity, TrendConfig, TrendDirection, TrendPolicy, TrendScope, UsageAnalytics,
    UsageReport, MAX_PERIOD_STEPS,
};
