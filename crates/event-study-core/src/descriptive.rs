//! Descriptive statistics over `f64` samples.
//!
//! Every helper returns `None` where the statistic is undefined (empty input,
//! fewer than two observations for a sample deviation) instead of NaN.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().mean())
}

/// Sample standard deviation (n-1 denominator).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    finite(values.iter().std_dev())
}

/// Sample variance (n-1 denominator).
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    finite(values.iter().variance())
}

/// Median; even-length samples land midway between the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(Median::median(&Data::new(values.to_vec())))
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// mean / median / std / count of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub count: usize,
}

impl MetricSummary {
    pub fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            median: median(values),
            std: std_dev(values),
            count: values.len(),
        }
    }
}
