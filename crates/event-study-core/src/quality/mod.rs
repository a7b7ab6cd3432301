//! Screening of stock price history before it enters an event study.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::PriceSeries;

/// Default minimum number of trading days.
pub const DEFAULT_MIN_TRADING_DAYS: usize = 100;
/// Daily returns beyond this magnitude count as extreme.
pub const EXTREME_RETURN: f64 = 0.5;
/// At this many extreme returns the series is rejected.
pub const MAX_EXTREME_RETURNS: usize = 5;
/// Share of market trading days a stock may miss.
pub const MAX_MISSING_SHARE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub valid: bool,
    pub trading_days: usize,
    /// Trading days of the market index over the same span.
    pub expected_days: usize,
    /// `expected_days - trading_days`; negative when the stock has extra days.
    pub missing_days: i64,
    pub extreme_returns: usize,
    pub reason: String,
}

/// Check a stock series against the market calendar.
///
/// Valid when the stock has at least `min_trading_days` rows, misses fewer
/// than 10% of the market's trading days, and has fewer than five daily
/// moves above 50%.
pub fn validate_data_quality(
    stock: &PriceSeries,
    market: &PriceSeries,
    min_trading_days: usize,
) -> DataQualityReport {
    if stock.is_empty() {
        return DataQualityReport {
            valid: false,
            trading_days: 0,
            expected_days: market.len(),
            missing_days: 0,
            extreme_returns: 0,
            reason: "No data available".to_string(),
        };
    }

    let trading_days = stock.len();
    let expected_days = market.len();
    let missing_days = expected_days as i64 - trading_days as i64;
    let extreme_returns = stock
        .returns()
        .into_iter()
        .filter_map(|(_, r)| r)
        .filter(|r| r.abs() > EXTREME_RETURN)
        .count();

    let valid = trading_days >= min_trading_days
        && (missing_days as f64) < MAX_MISSING_SHARE * expected_days as f64
        && extreme_returns < MAX_EXTREME_RETURNS;
    if !valid {
        warn!(
            "Price data rejected: {} trading days, {} missing, {} extreme returns",
            trading_days, missing_days, extreme_returns
        );
    }

    DataQualityReport {
        valid,
        trading_days,
        expected_days,
        missing_days,
        extreme_returns,
        reason: if valid {
            "Valid".to_string()
        } else {
            "Insufficient or poor quality data".to_string()
        },
    }
}
