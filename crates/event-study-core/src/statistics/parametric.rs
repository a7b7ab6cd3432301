use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::error;

use super::{defined, StatisticKind, StatisticalTests, TestDetails, TestResult};
use crate::descriptive;
use crate::event_study::{EventResult, MetricColumn};

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
pub(crate) fn two_sided_t_p_value(t_stat: f64, df: f64) -> Option<f64> {
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => Some((2.0 * dist.sf(t_stat.abs())).min(1.0)),
        Err(e) => {
            error!("Student's t distribution with df={} failed: {}", df, e);
            None
        }
    }
}

impl StatisticalTests {
    /// One-sample two-sided t-test of `mean = null_hypothesis`.
    ///
    /// Non-finite observations are dropped first. Invalid when nothing is
    /// left, fewer than two observations remain, or the sample has no variance.
    pub fn t_test(&self, values: &[f64], null_hypothesis: f64) -> TestResult {
        const NAME: &str = "t-test";
        let ar: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if ar.is_empty() {
            return TestResult::invalid(NAME, "No valid observations");
        }

        let n = ar.len();
        let (Some(mean), Some(std)) = (descriptive::mean(&ar), descriptive::std_dev(&ar)) else {
            return TestResult::invalid(NAME, "Insufficient variance or observations");
        };
        if std == 0.0 || n < 2 {
            return TestResult::invalid(NAME, "Insufficient variance or observations");
        }

        let t_stat = (mean - null_hypothesis) / (std / (n as f64).sqrt());
        let df = (n - 1) as f64;
        let Some(p_value) = two_sided_t_p_value(t_stat, df) else {
            return TestResult::invalid(NAME, "Student's t distribution unavailable");
        };

        TestResult::computed(
            NAME,
            self.outcome(
                Some((StatisticKind::T, t_stat)),
                Some(df),
                p_value,
                n,
                TestDetails::TTest { mean, std },
            ),
        )
    }

    /// t-test of one result column across valid events (at least two).
    pub fn cross_sectional_test(&self, results: &[EventResult], column: MetricColumn) -> TestResult {
        const NAME: &str = "cross-sectional";
        let valid: Vec<&EventResult> = results.iter().filter(|r| r.is_valid()).collect();
        if valid.len() < 2 {
            return TestResult::invalid(NAME, "Insufficient valid events");
        }
        let values: Vec<f64> = valid.iter().filter_map(|r| r.value(column)).collect();
        let mut result = self.t_test(&values, 0.0);
        result.test = NAME.to_string();
        result
    }

    /// Significance of CARs across events.
    ///
    /// Without variance estimates this is a plain t-test. With them (aligned
    /// by position with `cars`), the inverse-variance weighted mean CAR is
    /// tested against its standard error `sqrt(1 / sum(w))`, df = n - 1,
    /// over events that have both a CAR and a positive variance.
    pub fn car_significance_test(
        &self,
        cars: &[Option<f64>],
        variances: Option<&[Option<f64>]>,
    ) -> TestResult {
        const NAME: &str = "CAR-test";
        const WEIGHTED: &str = "CAR-test (weighted)";

        let defined_cars = defined(cars);
        if defined_cars.is_empty() {
            return TestResult::invalid(NAME, "No valid CAR values");
        }

        let Some(variances) = variances else {
            return self.t_test(&defined_cars, 0.0);
        };

        let aligned: Vec<(f64, f64)> = cars
            .iter()
            .zip(variances.iter())
            .filter_map(|(c, v)| match (c, v) {
                (Some(c), Some(v)) if c.is_finite() && v.is_finite() && *v > 0.0 => Some((*c, *v)),
                _ => None,
            })
            .collect();

        if aligned.len() < 2 {
            return TestResult::invalid(NAME, "Insufficient observations with variance estimates");
        }

        let weight_sum: f64 = aligned.iter().map(|(_, v)| 1.0 / v).sum();
        let weighted_mean_car = aligned.iter().map(|(c, v)| c / v).sum::<f64>() / weight_sum;
        let std_weighted_mean = (1.0 / weight_sum).sqrt();

        let t_stat = weighted_mean_car / std_weighted_mean;
        let n = aligned.len();
        let df = (n - 1) as f64;
        let Some(p_value) = two_sided_t_p_value(t_stat, df) else {
            return TestResult::invalid(WEIGHTED, "Student's t distribution unavailable");
        };

        TestResult::computed(
            WEIGHTED,
            self.outcome(
                Some((StatisticKind::T, t_stat)),
                Some(df),
                p_value,
                n,
                TestDetails::WeightedCar {
                    mean_car: weighted_mean_car,
                    std_car: std_weighted_mean,
                },
            ),
        )
    }
}
