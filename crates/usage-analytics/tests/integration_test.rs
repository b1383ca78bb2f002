use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stratoswarm_usage_analytics::{
    AnalysisPeriod, AnalyticsConfig, AnalyticsError, AnalyticsResult, AnomalyKind,
    AnomalyObserver, AnomalySeverity, ConsumptionAnomaly, ConsumptionReading, FixedReadingSource,
    LoadProfile, PatternType, ReadingSource, SyntheticReadingSource, TimeGranularity, TrendPolicy,
    UsageAnalytics, MAX_PERIOD_STEPS,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap()
}

fn period(days: i64, granularity: TimeGranularity) -> AnalysisPeriod {
    AnalysisPeriod::new(start(), start() + Duration::days(days), granularity).unwrap()
}

/// Hourly readings for `days` days: 50 kWh during 9-17, 20 kWh otherwise, with one
/// critical spike at noon on the last day
fn metered_readings(days: i64) -> Vec<ConsumptionReading> {
    let mut readings: Vec<ConsumptionReading> = (0..days * 24)
        .map(|h| {
            let hour = h % 24;
            let peak = (9..=17).contains(&hour);
            let kwh = if peak { 50.0 } else { 20.0 };
            ConsumptionReading::new(start() + Duration::hours(h), kwh, peak).unwrap()
        })
        .collect();

    let spike_at = ((days - 1) * 24 + 12) as usize;
    readings[spike_at].kilowatt_hours = 400.0;
    readings
}

struct CountingSource {
    inner: SyntheticReadingSource,
    calls: AtomicUsize,
}

impl ReadingSource for CountingSource {
    fn readings(
        &self,
        period: &AnalysisPeriod,
        profile: LoadProfile,
    ) -> AnalyticsResult<Vec<ConsumptionReading>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        self.inner.readings(period, profile)
    }
}

struct RecordingObserver {
    seen: Mutex<Vec<ConsumptionAnomaly>>,
}

impl AnomalyObserver for RecordingObserver {
    fn on_anomaly(&self, anomaly: &ConsumptionAnomaly) -> AnalyticsResult<()> {
        self.seen.lock().push(anomaly.clone());
        Ok(())
    }
}

struct RejectingObserver;

impl AnomalyObserver for RejectingObserver {
    fn on_anomaly(&self, _anomaly: &ConsumptionAnomaly) -> AnalyticsResult<()> {
        Err(AnalyticsError::ReadingSourceError {
            details: "alert gateway unreachable".to_string(),
        })
    }
}

#[test]
fn test_end_to_end_report_over_metered_readings() {
    init_tracing();
    let source = FixedReadingSource::new(metered_readings(7))
        .with_customers(vec!["meter-0042".to_string()]);
    let analytics =
        UsageAnalytics::with_reading_source(AnalyticsConfig::default(), Arc::new(source)).unwrap();

    let observer = Arc::new(RecordingObserver {
        seen: Mutex::new(Vec::new()),
    });
    analytics.register_observer(observer.clone());

    let period = period(7, TimeGranularity::Hourly);
    let report = analytics.generate_report(&period).unwrap();

    assert_eq!(report.patterns.len(), 3);
    assert!(report
        .patterns
        .iter()
        .all(|p| p.affected_customers == vec!["meter-0042".to_string()]));

    let baseline = report
        .patterns
        .iter()
        .find(|p| p.pattern_type == PatternType::Baseline)
        .unwrap();
    assert!(baseline.readings.iter().all(|r| !r.is_peak_hours));

    let spike = report
        .anomalies
        .iter()
        .find(|a| a.kind == AnomalyKind::Spike)
        .unwrap();
    assert_eq!(spike.severity, AnomalySeverity::Critical);
    assert!(spike.affected_readings.iter().all(|r| r.kilowatt_hours == 400.0));

    // Delivered synchronously, before generate_report returned
    let seen = observer.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, spike.id);
}

#[test]
fn test_report_anomalies_reference_only_pattern_readings() {
    let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();

    for granularity in [
        TimeGranularity::Hourly,
        TimeGranularity::Daily,
        TimeGranularity::Weekly,
    ] {
        let report = analytics
            .generate_report(&period(28, granularity))
            .unwrap();
        let readings = report.pattern_readings();

        for anomaly in &report.anomalies {
            assert!(anomaly
                .affected_readings
                .iter()
                .all(|r| readings.contains(r)));
        }
    }
}

#[test]
fn test_failing_observer_does_not_block_delivery() {
    init_tracing();
    let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();
    let delivered = Arc::new(AtomicUsize::new(0));

    analytics.register_observer(Arc::new(RejectingObserver));
    analytics.register_anomaly_callback(|_| {
        panic!("observer crashed");
    });
    let counter = Arc::clone(&delivered);
    analytics.register_anomaly_callback(move |anomaly| {
        assert_eq!(anomaly.severity, AnomalySeverity::Critical);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut readings: Vec<_> = (0..30)
        .map(|d| ConsumptionReading::new(start() + Duration::days(d), 12.0, true).unwrap())
        .collect();
    readings.push(ConsumptionReading::new(start() + Duration::days(30), 300.0, true).unwrap());

    let anomalies = analytics.detect_anomalies(&readings);

    assert!(anomalies.iter().any(|a| a.severity == AnomalySeverity::Critical));
    assert_eq!(delivered.load(Ordering::SeqCst), 1);

    let metrics = analytics.get_metrics();
    assert_eq!(metrics.notifications_delivered, 1);
    assert_eq!(metrics.notification_failures, 2);
}

#[test]
fn test_empty_detection_invokes_no_observer() {
    let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    analytics.register_anomaly_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(analytics.detect_anomalies(&[]).is_empty());
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_period_rejected() {
    let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();

    let result =
        AnalysisPeriod::new(start(), start() - Duration::hours(1), TimeGranularity::Hourly);
    assert!(matches!(result, Err(AnalyticsError::InvalidPeriod { .. })));

    let backwards = AnalysisPeriod {
        start_date: start(),
        end_date: start() - Duration::hours(1),
        granularity: TimeGranularity::Hourly,
    };
    assert!(matches!(
        analytics.generate_report(&backwards),
        Err(AnalyticsError::InvalidPeriod { .. })
    ));

    // Two centuries of hourly steps is over the step limit
    let oversized = AnalysisPeriod {
        start_date: start(),
        end_date: start() + Duration::days(365 * 200),
        granularity: TimeGranularity::Hourly,
    };
    assert!(oversized.step_count() > MAX_PERIOD_STEPS);
    assert!(matches!(
        analytics.analyze_patterns(&oversized),
        Err(AnalyticsError::InvalidPeriod { .. })
    ));
    assert_eq!(analytics.get_metrics().pattern_computations, 0);
}

#[test]
fn test_derived_trends_follow_readings() {
    let readings: Vec<ConsumptionReading> = (0..60)
        .map(|d| {
            let ts = start() + Duration::days(d) + Duration::hours(10);
            ConsumptionReading::new(ts, 100.0 - d as f64, true).unwrap()
        })
        .collect();

    let mut config = AnalyticsConfig::default();
    config.trends.policy = TrendPolicy::Derived;
    let analytics =
        UsageAnalytics::with_reading_source(config, Arc::new(FixedReadingSource::new(readings)))
            .unwrap();

    let trends = analytics
        .identify_trends(&period(60, TimeGranularity::Daily))
        .unwrap();

    assert_eq!(trends.len(), 3);
    assert!(trends.iter().all(|t| t.magnitude > 0.0));
    assert_eq!(
        trends[0].direction,
        stratoswarm_usage_analytics::TrendDirection::Decreasing
    );
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "detection": { "notify_min_severity": "High" },
        "synthetic": { "jitter_fraction": 0.0 }
    }"#;
    let config = AnalyticsConfig::from_json_str(json).unwrap();
    let analytics = UsageAnalytics::new(config).unwrap();

    let patterns = analytics
        .analyze_patterns(&period(1, TimeGranularity::Hourly))
        .unwrap();
    let peak = &patterns[0];
    assert!(peak.readings.iter().all(|r| r.kilowatt_hours == 50.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pattern_requests_share_one_computation() {
    let source = Arc::new(CountingSource {
        inner: SyntheticReadingSource::default(),
        calls: AtomicUsize::new(0),
    });
    let analytics = Arc::new(
        UsageAnalytics::with_reading_source(AnalyticsConfig::default(), source.clone()).unwrap(),
    );
    let period = period(14, TimeGranularity::Hourly);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let analytics = Arc::clone(&analytics);
            tokio::task::spawn_blocking(move || analytics.analyze_patterns(&period))
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    // three reading requests make up one pattern computation
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));

    let metrics = analytics.get_metrics();
    assert_eq!(metrics.pattern_computations, 1);
    assert_eq!(metrics.cache_hits, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_for_distinct_granularities() {
    let analytics = Arc::new(UsageAnalytics::new(AnalyticsConfig::default()).unwrap());

    let handles: Vec<_> = [
        TimeGranularity::Hourly,
        TimeGranularity::Daily,
        TimeGranularity::Weekly,
        TimeGranularity::Monthly,
    ]
    .into_iter()
    .map(|granularity| {
        let analytics = Arc::clone(&analytics);
        tokio::task::spawn_blocking(move || {
            analytics.generate_report(&period(90, granularity))
        })
    })
    .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        ids.push(report.id);
    }

    assert_eq!(analytics.cached_report_count(), 4);
    assert_eq!(analytics.get_metrics().pattern_computations, 4);
    assert!(ids.iter().all(|id| analytics.get_report(id).is_some()));
}
