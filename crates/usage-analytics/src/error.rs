//! Usage analytics error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Usage analytics error types
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Statistics requested over an empty reading set
    #[error("No consumption readings to analyze")]
    EmptyInput,

    /// Analysis period starts after it ends or spans too many steps
    #[error("Invalid analysis period {start} to {end}: {reason}")]
    InvalidPeriod {
        /// Period start
        start: DateTime<Utc>,
        /// Period end
        end: DateTime<Utc>,
        /// What makes the period unusable
        reason: String,
    },

    /// Granularity string not recognised
    #[error("Unsupported granularity: {value}")]
    UnsupportedGranularity {
        /// Rejected input
        value: String,
    },

    /// Reading quantity is negative or not finite
    #[error("Invalid consumption reading: {details}")]
    InvalidReading {
        /// Offending quantity
        details: String,
    },

    /// Anomaly observer returned an error or panicked
    #[error("Anomaly observer {observer} failed: {reason}")]
    ObserverFailed {
        /// Observer id
        observer: String,
        /// Returned error or panic message
        reason: String,
    },

    /// Reading source could not supply readings
    #[error("Reading source failed: {details}")]
    ReadingSourceError {
        /// Source failure
        details: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    ConfigurationError {
        /// Setting and constraint violated
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying serde_json error
        #[from]
        source: serde_json::Error,
    },
}

/// Usage analytics result type
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_empty_input_error() {
        let error = AnalyticsError::EmptyInput;
        assert_eq!(error.to_string(), "No consumption readings to analyze");
    }

    #[test]
    fn test_invalid_period_error() {
        let start = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let error = AnalyticsError::InvalidPeriod {
            start,
            end,
            reason: "start is after end".to_string(),
        };
        let message = error.to_string();
        assert!(message.starts_with("Invalid analysis period"));
        assert!(message.contains("2024-03-02"));
        assert!(message.contains("2024-03-01"));
        assert!(message.ends_with("start is after end"));
    }

    #[test]
    fn test_unsupported_granularity_error() {
        let error = AnalyticsError::UnsupportedGranularity {
            value: "fortnightly".to_string(),
        };
        assert_eq!(error.to_string(), "Unsupported granularity: fortnightly");
    }

    #[test]
    fn test_observer_failed_error() {
        let error = AnalyticsError::ObserverFailed {
            observer: "observer-3".to_string(),
            reason: "pager unreachable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Anomaly observer observer-3 failed: pager unreachable"
        );
    }

    #[test]
    fn test_configuration_error() {
        let error = AnalyticsError::ConfigurationError {
            message: "jitter_fraction must be in [0, 1)".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration: jitter_fraction must be in [0, 1)"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error = AnalyticsError::from(json_error);
        assert!(error.to_string().contains("JSON error"));
    }

    #[test]
    fn test_error_chaining() {
        fn may_fail() -> AnalyticsResult<serde_json::Value> {
            let value = serde_json::from_str("[1, 2")?;
            Ok(value)
        }

        match may_fail().unwrap_err() {
            AnalyticsError::JsonError { .. } => {}
            other => panic!("Expected JsonError variant, got {other:?}"),
        }
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AnalyticsError>();
        assert_sync::<AnalyticsError>();
    }
}
