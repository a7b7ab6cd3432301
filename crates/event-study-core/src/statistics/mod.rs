//! Significance tests over abnormal-return distributions.
//!
//! Every test returns a [`TestResult`]. Degenerate inputs (too few
//! observations, zero variance, a single group) produce `valid = false` with
//! a human-readable reason instead of an error.

pub mod anova;
pub mod battery;
pub mod nonparametric;
pub mod parametric;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::EventStudyConfig;

pub use battery::{SummaryRow, TestBattery};

/// p-value below which `significant` is set, independent of the labels.
pub const SIGNIFICANT_P: f64 = 0.05;

/// Categorical significance label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignificanceLevel {
    #[serde(rename = "***")]
    Strong,
    #[serde(rename = "**")]
    Moderate,
    #[serde(rename = "*")]
    Weak,
    #[serde(rename = "ns")]
    NotSignificant,
}

impl SignificanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignificanceLevel::Strong => "***",
            SignificanceLevel::Moderate => "**",
            SignificanceLevel::Weak => "*",
            SignificanceLevel::NotSignificant => "ns",
        }
    }
}

impl fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which statistic a test reports as its headline number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    T,
    F,
    /// Test-specific statistic (e.g. Wilcoxon's W).
    Generic,
}

/// Fields only some tests report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestDetails {
    TTest {
        mean: f64,
        std: f64,
    },
    Sign {
        n_positive: usize,
        n_negative: usize,
        n_total: usize,
    },
    Wilcoxon {
        median: f64,
    },
    WeightedCar {
        mean_car: f64,
        std_car: f64,
    },
    /// F-test degrees of freedom live here; `TestOutcome` holds only one.
    Anova {
        num_groups: usize,
        df_between: f64,
        df_within: f64,
        group_means: BTreeMap<String, Option<f64>>,
    },
}

/// A computed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic_kind: Option<StatisticKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
    pub p_value: f64,
    pub significant: bool,
    pub significance_level: SignificanceLevel,
    pub n: usize,
    #[serde(flatten)]
    pub details: TestDetails,
}

/// Result of one hypothesis test; `outcome` is present iff `valid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test: String,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub outcome: Option<TestOutcome>,
}

impl TestResult {
    pub fn invalid(test: &str, reason: &str) -> Self {
        Self {
            test: test.to_string(),
            valid: false,
            reason: Some(reason.to_string()),
            outcome: None,
        }
    }

    fn computed(test: &str, outcome: TestOutcome) -> Self {
        Self {
            test: test.to_string(),
            valid: true,
            reason: None,
            outcome: Some(outcome),
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        self.outcome.as_ref().map(|o| o.p_value)
    }

    pub fn statistic(&self) -> Option<f64> {
        self.outcome.as_ref().and_then(|o| o.statistic)
    }

    pub fn significance_level(&self) -> Option<SignificanceLevel> {
        self.outcome.as_ref().map(|o| o.significance_level)
    }

    pub fn details(&self) -> Option<&TestDetails> {
        self.outcome.as_ref().map(|o| &o.details)
    }
}

/// Statistical test suite configured with the significance thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalTests {
    levels: [f64; 3],
}

impl Default for StatisticalTests {
    fn default() -> Self {
        Self {
            levels: [0.01, 0.05, 0.10],
        }
    }
}

impl StatisticalTests {
    pub fn new(config: &EventStudyConfig) -> Self {
        Self {
            levels: config.significance_levels,
        }
    }

    /// `***` / `**` / `*` / `ns` by the configured thresholds.
    pub fn significance_label(&self, p_value: f64) -> SignificanceLevel {
        let [strong, moderate, weak] = self.levels;
        if p_value < strong {
            SignificanceLevel::Strong
        } else if p_value < moderate {
            SignificanceLevel::Moderate
        } else if p_value < weak {
            SignificanceLevel::Weak
        } else {
            SignificanceLevel::NotSignificant
        }
    }

    fn outcome(
        &self,
        statistic: Option<(StatisticKind, f64)>,
        degrees_of_freedom: Option<f64>,
        p_value: f64,
        n: usize,
        details: TestDetails,
    ) -> TestOutcome {
        TestOutcome {
            statistic: statistic.map(|(_, v)| v),
            statistic_kind: statistic.map(|(k, _)| k),
            degrees_of_freedom,
            p_value,
            significant: p_value < SIGNIFICANT_P,
            significance_level: self.significance_label(p_value),
            n,
            details,
        }
    }
}

/// Drop undefined observations.
pub(crate) fn defined(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect()
}
