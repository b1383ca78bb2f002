//! Usage analytics engine for metered electricity consumption
//!
//! ## Module Structure
//!
//! - `types`: Periods, patterns, trends, anomalies and reports
//! - `config`: Engine configuration
//! - `statistics`: Baseline statistics and series helpers
//! - `cache`: Compute-once cache keyed by analysis period
//! - `pattern_analyzer`: Consumption pattern rule set
//! - `trend_identifier`: Per-scope consumption trends
//! - `anomaly_detector`: Multi-rule anomaly detection
//! - `notifier`: Anomaly observer registry
//!
//! ## Usage
//!
//! ```rust
//! use stratoswarm_usage_analytics::{AnalysisPeriod, AnalyticsConfig, TimeGranularity, UsageAnalytics};
//! use chrono::{Duration, Utc};
//!
//! let analytics = UsageAnalytics::new(AnalyticsConfig::default())?;
//! analytics.register_anomaly_callback(|anomaly| println!("{}", anomaly.description));
//!
//! let end = Utc::now();
//! let period = AnalysisPeriod::new(end - Duration::days(7), end, TimeGranularity::Hourly)?;
//! let report = analytics.generate_report(&period)?;
//! println!("{}", analytics.generate_summary(&report));
//! # Ok::<(), stratoswarm_usage_analytics::AnalyticsError>(())
//! ```

pub mod anomaly_detector;
pub mod cache;
pub mod config;
pub mod notifier;
pub mod pattern_analyzer;
pub mod statistics;
pub mod trend_identifier;
pub mod types;

pub use anomaly_detector::{AnomalyDetector, DetectionRun};
pub use cache::PeriodCache;
pub use config::{
    AnalyticsConfig, DetectionConfig, PatternConfig, SyntheticReadingConfig, TrendConfig,
    TrendPolicy,
};
pub use notifier::{
    AnomalyNotifier, AnomalyObserver, CallbackObserver, DispatchOutcome, ObserverId,
};
pub use pattern_analyzer::PatternAnalyzer;
pub use statistics::{BaselineKind, BaselineStats, StatisticsCalculator};
pub use trend_identifier::TrendIdentifier;
pub use types::*;

use crate::error::AnalyticsResult;
use crate::readings::{ConsumptionReading, ReadingSource, SyntheticReadingSource};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Usage analytics engine coordinating analysis, detection and notification
pub struct UsageAnalytics {
    /// Configuration
    config: Arc<AnalyticsConfig>,
    /// Patterns by period
    pattern_cache: Arc<PeriodCache<AnalysisPeriod, Vec<ConsumptionPattern>>>,
    /// Trends by period
    trend_cache: Arc<PeriodCache<AnalysisPeriod, Vec<ConsumptionTrend>>>,
    /// Generated reports by id
    reports: Arc<DashMap<Uuid, Arc<UsageReport>>>,
    /// Engine counters
    metrics: Arc<RwLock<AnalyticsMetrics>>,
    /// Anomaly observers
    notifier: Arc<AnomalyNotifier>,
    /// Monitoring flag
    monitoring: AtomicBool,
    /// Pattern analyzer
    pattern_analyzer: PatternAnalyzer,
    /// Trend identifier
    trend_identifier: TrendIdentifier,
    /// Anomaly detector
    anomaly_detector: AnomalyDetector,
}

impl UsageAnalytics {
    /// Create an engine backed by the synthetic reading source
    pub fn new(config: AnalyticsConfig) -> AnalyticsResult<Self> {
        let source = Arc::new(SyntheticReadingSource::new(config.synthetic.clone()));
        Self::with_reading_source(config, source)
    }

    /// Create an engine reading consumption from `source`
    pub fn with_reading_source(
        config: AnalyticsConfig,
        source: Arc<dyn ReadingSource>,
    ) -> AnalyticsResult<Self> {
        config.validate()?;

        let notifier = Arc::new(AnomalyNotifier::new());

        Ok(Self {
            pattern_analyzer: PatternAnalyzer::new(config.patterns.clone(), Arc::clone(&source)),
            trend_identifier: TrendIdentifier::new(config.trends.clone(), source),
            anomaly_detector: AnomalyDetector::new(config.detection.clone(), Arc::clone(&notifier)),
            config: Arc::new(config),
            pattern_cache: Arc::new(PeriodCache::new()),
            trend_cache: Arc::new(PeriodCache::new()),
            reports: Arc::new(DashMap::new()),
            metrics: Arc::new(RwLock::new(AnalyticsMetrics::default())),
            notifier,
            monitoring: AtomicBool::new(false),
        })
    }

    /// Consumption patterns for `period`, computed once per period
    pub fn analyze_patterns(
        &self,
        period: &AnalysisPeriod,
    ) -> AnalyticsResult<Vec<ConsumptionPattern>> {
        period.validate()?;

        let (patterns, computed) = self
            .pattern_cache
            .get_or_try_compute(period, || self.pattern_analyzer.analyze(period))?;

        let mut metrics = self.metrics.write();
        if computed {
            metrics.pattern_computations += 1;
            debug!(
                "Computed {} patterns for {} to {} ({})",
                patterns.len(),
                period.start_date,
                period.end_date,
                period.granularity
            );
        } else {
            metrics.cache_hits += 1;
            debug!("Pattern cache hit for {} to {}", period.start_date, period.end_date);
        }

        Ok(patterns)
    }

    /// Consumption trends for `period`, computed once per period
    pub fn identify_trends(
        &self,
        period: &AnalysisPeriod,
    ) -> AnalyticsResult<Vec<ConsumptionTrend>> {
        period.validate()?;

        let (trends, computed) = self
            .trend_cache
            .get_or_try_compute(period, || self.trend_identifier.identify(period))?;

        let mut metrics = self.metrics.write();
        if computed {
            metrics.trend_computations += 1;
            debug!(
                "Computed {} trends for {} to {} ({})",
                trends.len(),
                period.start_date,
                period.end_date,
                period.granularity
            );
        } else {
            metrics.cache_hits += 1;
            debug!("Trend cache hit for {} to {}", period.start_date, period.end_date);
        }

        Ok(trends)
    }

    /// Detect anomalies in `readings`, notifying observers before returning
    pub fn detect_anomalies(&self, readings: &[ConsumptionReading]) -> Vec<ConsumptionAnomaly> {
        let run = self.anomaly_detector.detect(readings);

        let mut metrics = self.metrics.write();
        metrics.detection_runs += 1;
        for anomaly in &run.anomalies {
            *metrics
                .anomalies_by_severity
                .entry(anomaly.severity)
                .or_insert(0) += 1;
        }
        metrics.notifications_delivered += run.dispatch.delivered as u64;
        metrics.notification_failures += run.dispatch.failed as u64;

        run.anomalies
    }

    /// Build and store a report for `period`
    pub fn generate_report(&self, period: &AnalysisPeriod) -> AnalyticsResult<Arc<UsageReport>> {
        period.validate()?;
        info!(
            "Generating usage report for {} to {} ({})",
            period.start_date, period.end_date, period.granularity
        );

        let patterns = self.analyze_patterns(period)?;
        let trends = self.identify_trends(period)?;

        let readings = distinct_readings(&patterns);
        let anomalies = self.detect_anomalies(&readings);

        let report = Arc::new(UsageReport {
            id: Uuid::new_v4(),
            period: *period,
            patterns,
            trends,
            anomalies,
            generated_at: Utc::now(),
        });

        self.reports.insert(report.id, Arc::clone(&report));
        self.metrics.write().reports_generated += 1;

        info!(
            "Report {} generated: {} patterns, {} trends, {} anomalies",
            report.id,
            report.patterns.len(),
            report.trends.len(),
            report.anomalies.len()
        );

        Ok(report)
    }

    /// Register a closure invoked for each notified anomaly
    pub fn register_anomaly_callback<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&ConsumptionAnomaly) + Send + Sync + 'static,
    {
        self.notifier.register(Arc::new(CallbackObserver::new(callback)))
    }

    /// Register an observer invoked for each notified anomaly
    pub fn register_observer(&self, observer: Arc<dyn AnomalyObserver>) -> ObserverId {
        self.notifier.register(observer)
    }

    /// Remove an observer, returning whether it was registered
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.notifier.unregister(id)
    }

    /// Whether monitoring is switched on
    pub fn is_monitoring_active(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// Switch monitoring on
    pub fn start_monitoring(&self) {
        if !self.monitoring.swap(true, Ordering::AcqRel) {
            info!("Usage monitoring started");
        }
    }

    /// Switch monitoring off
    pub fn stop_monitoring(&self) {
        if self.monitoring.swap(false, Ordering::AcqRel) {
            info!("Usage monitoring stopped");
        }
    }

    /// Previously generated report
    pub fn get_report(&self, id: &Uuid) -> Option<Arc<UsageReport>> {
        self.reports.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Number of stored reports
    pub fn cached_report_count(&self) -> usize {
        self.reports.len()
    }

    /// Drop cached patterns, trends and reports
    pub fn clear_cache(&self) {
        self.pattern_cache.clear();
        self.trend_cache.clear();
        self.reports.clear();
    }

    /// Get current engine metrics
    pub fn get_metrics(&self) -> AnalyticsMetrics {
        self.metrics.read().clone()
    }

    /// Human-readable summary of a report
    pub fn generate_summary(&self, report: &UsageReport) -> String {
        let mut summary = String::new();

        summary.push_str(&format!(
            "Usage Report {} ({} to {}, {})\n",
            report.id,
            report.period.start_date.format("%Y-%m-%d %H:%M"),
            report.period.end_date.format("%Y-%m-%d %H:%M"),
            report.period.granularity
        ));

        let consumption = report.consumption_summary();
        summary.push_str(&format!(
            "Consumption: {:.1} kWh total, {:.1} kWh peak, {:.1} kWh off-peak\n",
            consumption.total_kilowatt_hours,
            consumption.peak_kilowatt_hours,
            consumption.off_peak_kilowatt_hours
        ));

        if !report.patterns.is_empty() {
            summary.push_str(&format!("\nPatterns ({}):\n", report.patterns.len()));
            for pattern in &report.patterns {
                summary.push_str(&format!(
                    "- {} (confidence: {:.0}%)\n",
                    pattern.pattern_type,
                    pattern.confidence * 100.0
                ));
            }
        }

        if !report.trends.is_empty() {
            summary.push_str(&format!("\nTrends ({}):\n", report.trends.len()));
            for trend in &report.trends {
                summary.push_str(&format!("- {}\n", trend.description));
            }
        }

        if report.anomalies.is_empty() {
            summary.push_str("\nNo anomalies detected\n");
        } else {
            summary.push_str(&format!("\nAnomalies ({}):\n", report.anomalies.len()));
            for anomaly in &report.anomalies {
                summary.push_str(&format!(
                    "- [{}] {}\n",
                    anomaly.severity, anomaly.description
                ));
            }
        }

        summary
    }

    /// Validate configuration settings
    pub fn validate_config(&self) -> AnalyticsResult<()> {
        self.config.validate()
    }
}
