use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use std::collections::BTreeMap;
use tracing::error;

use super::{StatisticKind, StatisticalTests, TestDetails, TestResult};
use crate::descriptive;
use crate::event_study::{EventResult, MetricColumn};

impl StatisticalTests {
    /// One-way ANOVA of `column` across event types, over valid events only.
    ///
    /// Needs at least two event types with at least one defined value each.
    /// Group means are reported for every event type seen among valid events,
    /// `None` where the type has no defined value.
    pub fn compare_event_types(&self, results: &[EventResult], column: MetricColumn) -> TestResult {
        const NAME: &str = "ANOVA";
        let valid: Vec<&EventResult> = results.iter().filter(|r| r.is_valid()).collect();
        if valid.is_empty() {
            return TestResult::invalid(NAME, "No valid events");
        }

        let mut by_type: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for r in &valid {
            let values = by_type.entry(r.event_type.to_string()).or_default();
            if let Some(v) = r.value(column).filter(|v| v.is_finite()) {
                values.push(v);
            }
        }
        if by_type.len() < 2 {
            return TestResult::invalid(NAME, "Need at least 2 event types");
        }

        let groups: Vec<&Vec<f64>> = by_type.values().filter(|g| !g.is_empty()).collect();
        if groups.len() < 2 {
            return TestResult::invalid(NAME, "Insufficient data in groups");
        }

        let (f_stat, df_between, df_within) = match one_way_f(&groups) {
            Ok(f) => f,
            Err(reason) => return TestResult::invalid(NAME, reason),
        };
        let p_value = match FisherSnedecor::new(df_between, df_within) {
            Ok(dist) => dist.sf(f_stat),
            Err(e) => {
                error!(
                    "F distribution with df=({}, {}) failed: {}",
                    df_between, df_within, e
                );
                return TestResult::invalid(NAME, "F distribution unavailable");
            }
        };

        let n: usize = groups.iter().map(|g| g.len()).sum();
        let group_means = by_type
            .iter()
            .map(|(k, g)| (k.clone(), descriptive::mean(g)))
            .collect();

        TestResult::computed(
            NAME,
            self.outcome(
                Some((StatisticKind::F, f_stat)),
                None,
                p_value,
                n,
                TestDetails::Anova {
                    num_groups: groups.len(),
                    df_between,
                    df_within,
                    group_means,
                },
            ),
        )
    }
}

/// F statistic with its between/within degrees of freedom.
fn one_way_f(groups: &[&Vec<f64>]) -> Result<(f64, f64, f64), &'static str> {
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if n <= k {
        return Err("Insufficient observations within groups");
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for g in groups {
        let mean = g.iter().sum::<f64>() / g.len() as f64;
        ss_between += g.len() as f64 * (mean - grand_mean).powi(2);
        ss_within += g.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    }
    if ss_within <= 0.0 {
        return Err("Zero within-group variance");
    }

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    Ok((
        (ss_between / df_between) / (ss_within / df_within),
        df_between,
        df_within,
    ))
}
