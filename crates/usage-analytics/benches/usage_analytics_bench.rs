use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stratoswarm_usage_analytics::{
    AnalysisPeriod, AnalyticsConfig, ConsumptionReading, TimeGranularity, UsageAnalytics,
};

fn hourly_readings(count: usize) -> Vec<ConsumptionReading> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|h| {
            let peak = (9..=17).contains(&(h % 24));
            let kwh = if peak { 50.0 } else { 20.0 } + (h % 7) as f64;
            ConsumptionReading::new(start + Duration::hours(h as i64), kwh, peak).unwrap()
        })
        .collect()
}

fn bench_anomaly_detection(c: &mut Criterion) {
    let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();
    let mut group = c.benchmark_group("anomaly_detection");

    for count in [24, 24 * 7, 24 * 30, 24 * 365] {
        let readings = hourly_readings(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &readings, |b, readings| {
            b.iter(|| black_box(analytics.detect_anomalies(black_box(readings))))
        });
    }

    group.finish();
}

fn bench_pattern_analysis(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let period =
        AnalysisPeriod::new(start, start + Duration::days(30), TimeGranularity::Hourly).unwrap();

    c.bench_function("pattern_analysis_uncached", |b| {
        let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();
        b.iter(|| {
            analytics.clear_cache();
            black_box(analytics.analyze_patterns(black_box(&period)))
        })
    });

    c.bench_function("pattern_analysis_cached", |b| {
        let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();
        analytics.analyze_patterns(&period).unwrap();
        b.iter(|| black_box(analytics.analyze_patterns(black_box(&period))))
    });
}

fn bench_report_generation(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let period =
        AnalysisPeriod::new(start, start + Duration::days(7), TimeGranularity::Hourly).unwrap();

    c.bench_function("report_generation_week_hourly", |b| {
        let analytics = UsageAnalytics::new(AnalyticsConfig::default()).unwrap();
        b.iter(|| {
            analytics.clear_cache();
            black_box(analytics.generate_report(black_box(&period)))
        })
    });
}

criterion_group!(
    benches,
    bench_anomaly_detection,
    bench_pattern_analysis,
    bench_report_generation
);
criterion_main!(benches);
