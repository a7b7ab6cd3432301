use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::types::Return;

/// Minimum joined observations for a market-model fit.
pub const MIN_ESTIMATION_OBSERVATIONS: usize = 30;

/// Market-model parameters: `R_stock = alpha + beta * R_market + e`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketModelFit {
    pub alpha: f64,
    pub beta: f64,
    /// Standard error of estimate, sqrt(SSR / (n - 2)). `None` for the fallback.
    pub residual_std: Option<f64>,
    pub r_squared: Option<f64>,
    /// Joined observations the fit used (0 for the fallback).
    pub observations: usize,
}

impl MarketModelFit {
    /// alpha = 0, beta = 1: expected return equals the market return.
    pub fn fallback() -> Self {
        Self {
            alpha: 0.0,
            beta: 1.0,
            residual_std: None,
            r_squared: None,
            observations: 0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.residual_std.is_none()
    }

    pub fn expected(&self, market_return: Return) -> Return {
        self.alpha + self.beta * market_return
    }
}

/// Fit the market model on date-keyed stock and market returns.
///
/// The two series are inner-joined on date; rows with a missing value on
/// either side are dropped. Fewer than 30 joined rows, or a degenerate
/// regression, yields [`MarketModelFit::fallback`]. Never fails.
pub fn fit(
    stock_returns: &[(NaiveDate, Option<Return>)],
    market_returns: &BTreeMap<NaiveDate, Return>,
) -> MarketModelFit {
    let (x, y): (Vec<f64>, Vec<f64>) = stock_returns
        .iter()
        .filter_map(|(date, r)| {
            let s = (*r)?;
            let m = *market_returns.get(date)?;
            (s.is_finite() && m.is_finite()).then_some((m, s))
        })
        .unzip();

    let n = x.len();
    if n < MIN_ESTIMATION_OBSERVATIONS {
        warn!("Insufficient data for market model: {} observations", n);
        return MarketModelFit::fallback();
    }

    match ols(&x, &y) {
        Some(fit) => fit,
        None => {
            error!(
                "Error in market model estimation: degenerate regression over {} observations",
                n
            );
            MarketModelFit::fallback()
        }
    }
}

/// Simple OLS of `y` on `x` with intercept. `None` when the market series has
/// no variance or the result is not finite.
fn ols(x: &[f64], y: &[f64]) -> Option<MarketModelFit> {
    let n = x.len();
    let n_f = n as f64;
    let x_mean = x.iter().sum::<f64>() / n_f;
    let y_mean = y.iter().sum::<f64>() / n_f;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    // Relative test so a constant series with rounding noise still counts as singular.
    let scale: f64 = x.iter().map(|v| v * v).sum();
    if sxx <= scale * 1e-20 {
        return None;
    }

    let beta = sxy / sxx;
    let alpha = y_mean - beta * x_mean;

    let ssr: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| {
            let e = yi - alpha - beta * xi;
            e * e
        })
        .sum();
    let residual_std = (ssr / (n_f - 2.0)).sqrt();
    let r_squared = if syy > 0.0 { Some(1.0 - ssr / syy) } else { None };

    if !(alpha.is_finite() && beta.is_finite() && residual_std.is_finite()) {
        return None;
    }

    Some(MarketModelFit {
        alpha,
        beta,
        residual_std: Some(residual_std),
        r_squared,
        observations: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dated(values: &[f64]) -> Vec<(NaiveDate, Option<f64>)> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), Some(*v)))
            .collect()
    }

    fn market_map(values: &[f64]) -> BTreeMap<NaiveDate, f64> {
        dated(values)
            .into_iter()
            .map(|(d, v)| (d, v.unwrap()))
            .collect()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i as f64) * 0.7).sin() * 0.02).collect()
    }

    #[test]
    fn test_identical_series_recovers_unit_beta() {
        let m = wave(60);
        let fit = fit(&dated(&m), &market_map(&m));
        assert!(fit.alpha.abs() < 1e-12, "alpha {}", fit.alpha);
        assert!((fit.beta - 1.0).abs() < 1e-12, "beta {}", fit.beta);
        assert!(fit.residual_std.unwrap() < 1e-12);
        assert_eq!(fit.observations, 60);
    }

    #[test]
    fn test_linear_relationship_recovered() {
        let m = wave(80);
        let s: Vec<f64> = m.iter().map(|r| 0.001 + 1.5 * r).collect();
        let fit = fit(&dated(&s), &market_map(&m));
        assert!((fit.alpha - 0.001).abs() < 1e-10);
        assert!((fit.beta - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_residual_std_uses_n_minus_two() {
        let m = wave(40);
        // alternate +e / -e noise around the line
        let s: Vec<f64> = m
            .iter()
            .enumerate()
            .map(|(i, r)| r + if i % 2 == 0 { 0.001 } else { -0.001 })
            .collect();
        let f = fit(&dated(&s), &market_map(&m));
        let ssr: f64 = m
            .iter()
            .zip(s.iter())
            .map(|(x, y)| (y - f.alpha - f.beta * x).powi(2))
            .sum();
        let expected = (ssr / 38.0).sqrt();
        assert!((f.residual_std.unwrap() - expected).abs() < 1e-15);
    }

    #[test]
    fn test_fewer_than_thirty_observations_falls_back() {
        let m = wave(29);
        let f = fit(&dated(&m), &market_map(&m));
        assert_eq!(f, MarketModelFit::fallback());
        assert_eq!(f.alpha, 0.0);
        assert_eq!(f.beta, 1.0);
        assert!(f.residual_std.is_none());
    }

    #[test]
    fn test_missing_rows_dropped_before_threshold() {
        let m = wave(40);
        let mut s = dated(&m);
        for row in s.iter_mut().take(15) {
            row.1 = None;
        }
        // 25 joined observations remain
        assert!(fit(&s, &market_map(&m)).is_fallback());
    }

    #[test]
    fn test_flat_market_is_degenerate() {
        let m = vec![0.01; 40];
        let s = wave(40);
        assert!(fit(&dated(&s), &market_map(&m)).is_fallback());
    }
}
