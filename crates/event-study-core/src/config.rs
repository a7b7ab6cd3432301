//! Run-wide configuration.
//!
//! The configuration is a plain value built once at start-up (defaults, or a
//! YAML file) and handed by reference to every component that needs it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::EventStudyError;
use crate::EventStudyResult;

/// Trading days around the aligned event day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindowConfig {
    #[serde(default = "default_pre")]
    pub pre: i64,
    #[serde(default = "default_post")]
    pub post: i64,
}

fn default_pre() -> i64 {
    5
}
fn default_post() -> i64 {
    5
}

impl Default for EventWindowConfig {
    fn default() -> Self {
        Self { pre: 5, post: 5 }
    }
}

/// Trading-day offsets (both negative) of the market-model estimation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationWindowConfig {
    #[serde(default = "default_estimation_start")]
    pub start: i64,
    #[serde(default = "default_estimation_end")]
    pub end: i64,
}

fn default_estimation_start() -> i64 {
    -130
}
fn default_estimation_end() -> i64 {
    -31
}

impl Default for EstimationWindowConfig {
    fn default() -> Self {
        Self {
            start: -130,
            end: -31,
        }
    }
}

/// Event-list filtering applied by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Tickers with fewer events are dropped.
    #[serde(default = "default_min_events")]
    pub min_events_per_company: usize,
    /// Minimum calendar-day gap between consecutive events of one ticker.
    #[serde(default = "default_min_days_between")]
    pub min_days_between: i64,
    /// Optional cap on analysed events (seeded random sample).
    #[serde(default)]
    pub max_events: Option<usize>,
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,
}

fn default_min_events() -> usize {
    5
}
fn default_min_days_between() -> i64 {
    1
}
fn default_sample_seed() -> u64 {
    42
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_events_per_company: 5,
            min_days_between: 1,
            max_events: None,
            sample_seed: 42,
        }
    }
}

/// Commit-spike detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeConfig {
    #[serde(default = "default_spike_threshold")]
    pub spike_threshold: f64,
    #[serde(default = "default_spike_window")]
    pub spike_window: usize,
    #[serde(default = "default_spike_min_periods")]
    pub spike_min_periods: usize,
}

fn default_spike_threshold() -> f64 {
    2.0
}
fn default_spike_window() -> usize {
    30
}
fn default_spike_min_periods() -> usize {
    7
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            spike_threshold: 2.0,
            spike_window: 30,
            spike_min_periods: 7,
        }
    }
}

/// Complete configuration for an event-study run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStudyConfig {
    #[serde(default)]
    pub event_window: EventWindowConfig,
    #[serde(default)]
    pub estimation_window: EstimationWindowConfig,
    /// One of `market`, `mean_adjusted`, `market_adjusted`.
    #[serde(default = "default_model")]
    pub expected_return_model: String,
    /// p-value thresholds for the `***`, `**` and `*` labels.
    #[serde(default = "default_significance_levels")]
    pub significance_levels: [f64; 3],
    #[serde(default = "default_market_index")]
    pub market_index: String,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub events: SpikeConfig,
}

fn default_model() -> String {
    "market".to_string()
}
fn default_significance_levels() -> [f64; 3] {
    [0.01, 0.05, 0.10]
}
fn default_market_index() -> String {
    "^GSPC".to_string()
}

impl Default for EventStudyConfig {
    fn default() -> Self {
        Self {
            event_window: EventWindowConfig::default(),
            estimation_window: EstimationWindowConfig::default(),
            expected_return_model: default_model(),
            significance_levels: default_significance_levels(),
            market_index: default_market_index(),
            analysis: AnalysisConfig::default(),
            events: SpikeConfig::default(),
        }
    }
}

impl EventStudyConfig {
    /// Parse a YAML document; absent keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> EventStudyResult<Self> {
        let config: EventStudyConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> EventStudyResult<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            EventStudyError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> EventStudyResult<()> {
        let ew = &self.event_window;
        let est = &self.estimation_window;

        if ew.pre < 0 || ew.post < 0 {
            return Err(invalid(
                "event_window",
                "pre and post day counts must be non-negative",
            ));
        }
        if est.start >= est.end {
            return Err(invalid(
                "estimation_window",
                "start must be strictly before end",
            ));
        }
        if est.end >= 0 {
            return Err(invalid(
                "estimation_window.end",
                "estimation window must end before the event day",
            ));
        }
        if est.end >= -ew.pre {
            return Err(invalid(
                "estimation_window.end",
                &format!(
                    "estimation window ending at {} overlaps the event window starting at {}",
                    est.end, -ew.pre
                ),
            ));
        }

        let [a, b, c] = self.significance_levels;
        if !(0.0 < a && a < b && b < c && c < 1.0) {
            return Err(invalid(
                "significance_levels",
                "thresholds must be strictly increasing within (0, 1)",
            ));
        }

        if self.analysis.min_days_between < 0 {
            return Err(invalid(
                "analysis.min_days_between",
                "must be non-negative",
            ));
        }
        if self.events.spike_min_periods < 2 || self.events.spike_window < self.events.spike_min_periods {
            return Err(invalid(
                "events.spike_window",
                "window must cover at least min_periods (>= 2) observations",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> EventStudyError {
    EventStudyError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let c = EventStudyConfig::default();
        assert_eq!(c.event_window.pre, 5);
        assert_eq!(c.event_window.post, 5);
        assert_eq!(c.estimation_window.start, -130);
        assert_eq!(c.estimation_window.end, -31);
        assert_eq!(c.expected_return_model, "market");
        assert_eq!(c.significance_levels, [0.01, 0.05, 0.10]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "event_window:\n  pre: 3\nexpected_return_model: mean_adjusted\n";
        let c = EventStudyConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(c.event_window.pre, 3);
        assert_eq!(c.event_window.post, 5);
        assert_eq!(c.expected_return_model, "mean_adjusted");
        assert_eq!(c.estimation_window.end, -31);
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        let mut c = EventStudyConfig::default();
        c.estimation_window.end = -3;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_inverted_estimation_window_rejected() {
        let mut c = EventStudyConfig::default();
        c.estimation_window.start = -20;
        c.estimation_window.end = -40;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_unordered_significance_levels_rejected() {
        let mut c = EventStudyConfig::default();
        c.significance_levels = [0.05, 0.01, 0.10];
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = EventStudyConfig::from_yaml_str("event_window: [1, 2").unwrap_err();
        assert!(matches!(err, EventStudyError::Config(_)));
    }
}
