use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::{info, warn};

use super::{SignificanceLevel, StatisticalTests, TestDetails, TestResult};
use crate::event_study::{EventResult, MetricColumn, StandardWindow};

// ---------------------------------------------------------------------------
// Named test results
// ---------------------------------------------------------------------------

/// Named test results in the order they were run. Serializes as a JSON
/// object keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestBattery {
    tests: Vec<(String, TestResult)>,
}

impl TestBattery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the result stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, result: TestResult) {
        let name = name.into();
        match self.tests.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = result,
            None => self.tests.push((name, result)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TestResult> {
        self.tests.iter().find(|(k, _)| k == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TestResult)> {
        self.tests.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl Serialize for TestBattery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tests.len()))?;
        for (name, result) in &self.tests {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TestBattery {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BatteryVisitor;

        impl<'de> Visitor<'de> for BatteryVisitor {
            type Value = TestBattery;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of test name to test result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut battery = TestBattery::new();
                while let Some((name, result)) = access.next_entry::<String, TestResult>()? {
                    battery.insert(name, result);
                }
                Ok(battery)
            }
        }

        deserializer.deserialize_map(BatteryVisitor)
    }
}

// ---------------------------------------------------------------------------
// Battery and summary
// ---------------------------------------------------------------------------

/// One row of the flattened summary of valid tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub test: String,
    pub statistic: Option<f64>,
    pub p_value: f64,
    pub significance: SignificanceLevel,
    pub n: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_ar: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_car: Option<f64>,
}

impl StatisticalTests {
    /// Every test over `column` of the valid results.
    ///
    /// Keys: `t_test`, `sign_test`, `wilcoxon_test`, `cross_sectional`,
    /// `anova`, then `<CAR column>_test` for each standard window with at
    /// least one defined value. No valid results gives an empty battery.
    pub fn perform_all_tests(&self, results: &[EventResult], column: MetricColumn) -> TestBattery {
        let valid: Vec<&EventResult> = results.iter().filter(|r| r.is_valid()).collect();
        let mut battery = TestBattery::new();
        if valid.is_empty() {
            warn!("No valid events for statistical testing");
            return battery;
        }

        let values: Vec<f64> = valid.iter().filter_map(|r| r.value(column)).collect();

        battery.insert("t_test", self.t_test(&values, 0.0));
        battery.insert("sign_test", self.sign_test(&values));
        battery.insert("wilcoxon_test", self.wilcoxon_signed_rank_test(&values));
        battery.insert("cross_sectional", self.cross_sectional_test(results, column));
        battery.insert("anova", self.compare_event_types(results, column));

        for window in StandardWindow::ALL {
            let cars: Vec<f64> = valid
                .iter()
                .filter_map(|r| r.value(MetricColumn::Car(window)))
                .collect();
            if !cars.is_empty() {
                battery.insert(format!("{}_test", window.column()), self.t_test(&cars, 0.0));
            }
        }

        info!(
            "Ran {} statistical tests over {} valid events",
            battery.len(),
            valid.len()
        );
        battery
    }

    /// Flatten the valid tests of `battery` into rows; invalid tests are left out.
    pub fn summary_table(&self, battery: &TestBattery) -> Vec<SummaryRow> {
        battery
            .iter()
            .filter_map(|(name, result)| {
                let outcome = result.outcome.as_ref().filter(|_| result.valid)?;
                let (mean_ar, mean_car) = match &outcome.details {
                    TestDetails::TTest { mean, .. } => (Some(*mean), None),
                    TestDetails::WeightedCar { mean_car, .. } => (None, Some(*mean_car)),
                    _ => (None, None),
                };
                Some(SummaryRow {
                    test: name.to_string(),
                    statistic: outcome.statistic,
                    p_value: outcome.p_value,
                    significance: outcome.significance_level,
                    n: outcome.n,
                    mean_ar,
                    mean_car,
                })
            })
            .collect()
    }
}
