//! Consumption pattern analysis
//!
//! The analyzer produces one pattern per rule in a fixed rule set: peak usage, the daily
//! consumption cycle, and baseline (off-peak) consumption. Confidence is a configured
//! constant per pattern type; readings come from the injected reading source.

use crate::error::AnalyticsResult;
use crate::readings::{LoadProfile, ReadingSource};
use crate::usage_analytics::config::PatternConfig;
use crate::usage_analytics::types::*;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// One entry of the pattern rule set
struct PatternRule {
    pattern_type: PatternType,
    profile: LoadProfile,
    description: &'static str,
}

const PATTERN_RULES: [PatternRule; 3] = [
    PatternRule {
        pattern_type: PatternType::PeakUsage,
        profile: LoadProfile::Peak,
        description: "Peak usage pattern during business hours",
    },
    PatternRule {
        pattern_type: PatternType::Cyclical,
        profile: LoadProfile::Cyclical,
        description: "Daily consumption cycle",
    },
    PatternRule {
        pattern_type: PatternType::Baseline,
        profile: LoadProfile::OffPeak,
        description: "Baseline consumption pattern",
    },
];

/// Pattern analyzer
pub struct PatternAnalyzer {
    /// Configuration
    config: PatternConfig,
    /// Reading source
    source: Arc<dyn ReadingSource>,
}

impl PatternAnalyzer {
    /// Create a new pattern analyzer
    pub fn new(config: PatternConfig, source: Arc<dyn ReadingSource>) -> Self {
        Self { config, source }
    }

    /// Analyze consumption patterns for `period`
    pub fn analyze(&self, period: &AnalysisPeriod) -> AnalyticsResult<Vec<ConsumptionPattern>> {
        period.validate()?;

        let customers = self.source.customer_ids(period);
        let mut patterns = Vec::with_capacity(PATTERN_RULES.len());

        for rule in &PATTERN_RULES {
            let readings = self.source.readings(period, rule.profile)?;
            debug!(
                "{} pattern for {} to {}: {} readings",
                rule.pattern_type,
                period.start_date,
                period.end_date,
                readings.len()
            );

            patterns.push(ConsumptionPattern {
                id: Uuid::new_v4(),
                pattern_type: rule.pattern_type,
                description: rule.description.to_string(),
                confidence: self.confidence_for(rule.pattern_type),
                affected_customers: customers.clone(),
                readings,
            });
        }

        Ok(patterns)
    }

    /// Configured confidence for a pattern type
    pub fn confidence_for(&self, pattern_type: PatternType) -> f64 {
        match pattern_type {
            PatternType::PeakUsage => self.config.peak_confidence,
            PatternType::OffPeakUsage => self.config.off_peak_confidence,
            // seasonal variation is a long-period cycle
            PatternType::Cyclical | PatternType::Seasonal => self.config.cyclical_confidence,
            PatternType::Baseline => self.config.baseline_confidence,
        }
    }
}
