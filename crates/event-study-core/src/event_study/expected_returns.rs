use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::market_model::{self, MarketModelFit};
use crate::descriptive;
use crate::error::EventStudyError;
use crate::types::{PriceSeries, Return};

/// How the "normal" return of an event-window day is predicted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedReturnModel {
    /// Constant: mean stock return over the estimation window.
    MeanAdjusted,
    /// The market's realised return on the same day.
    MarketAdjusted,
    /// alpha + beta * market return, fitted on the estimation window.
    #[default]
    Market,
}

impl ExpectedReturnModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedReturnModel::MeanAdjusted => "mean_adjusted",
            ExpectedReturnModel::MarketAdjusted => "market_adjusted",
            ExpectedReturnModel::Market => "market",
        }
    }
}

impl FromStr for ExpectedReturnModel {
    type Err = EventStudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean_adjusted" => Ok(ExpectedReturnModel::MeanAdjusted),
            "market_adjusted" => Ok(ExpectedReturnModel::MarketAdjusted),
            "market" => Ok(ExpectedReturnModel::Market),
            other => Err(EventStudyError::UnknownModel(other.to_string())),
        }
    }
}

impl fmt::Display for ExpectedReturnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected returns aligned row-for-row with the event window.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedReturns {
    pub values: Vec<(NaiveDate, Option<Return>)>,
    /// Parameters used by the market model, when it was fitted.
    pub fit: Option<MarketModelFit>,
}

impl ExpectedReturns {
    fn empty() -> Self {
        Self {
            values: Vec::new(),
            fit: None,
        }
    }
}

/// Project expected returns onto every event-window date under `model`.
pub fn expected_returns(
    event_window: &PriceSeries,
    estimation_window: &PriceSeries,
    market: &PriceSeries,
    model: ExpectedReturnModel,
) -> ExpectedReturns {
    if event_window.is_empty() {
        return ExpectedReturns::empty();
    }
    let event_dates = event_window.dates();

    match model {
        ExpectedReturnModel::MeanAdjusted => {
            let expected = if estimation_window.is_empty() {
                warn!("Empty estimation window; mean-adjusted model assumes zero expected return");
                Some(0.0)
            } else {
                let est: Vec<f64> = estimation_window
                    .returns()
                    .into_iter()
                    .filter_map(|(_, r)| r)
                    .collect();
                descriptive::mean(&est)
            };
            ExpectedReturns {
                values: event_dates.into_iter().map(|d| (d, expected)).collect(),
                fit: None,
            }
        }
        ExpectedReturnModel::MarketAdjusted => ExpectedReturns {
            values: reindex_market(&event_dates, market, None),
            fit: None,
        },
        ExpectedReturnModel::Market => {
            if estimation_window.is_empty() {
                warn!("Empty estimation window; falling back to market-adjusted returns");
                return ExpectedReturns {
                    values: reindex_market(&event_dates, market, None),
                    fit: None,
                };
            }
            let market_returns = market.return_map();
            let fit = market_model::fit(&estimation_window.returns(), &market_returns);
            ExpectedReturns {
                values: reindex_market(&event_dates, market, Some(&fit)),
                fit: Some(fit),
            }
        }
    }
}

/// Market returns on `dates` (missing dates are `None`), optionally mapped
/// through a fitted market model.
fn reindex_market(
    dates: &[NaiveDate],
    market: &PriceSeries,
    fit: Option<&MarketModelFit>,
) -> Vec<(NaiveDate, Option<Return>)> {
    let market_returns = market.return_map();
    dates
        .iter()
        .map(|d| {
            let m = market_returns.get(d).copied();
            let e = match fit {
                Some(f) => m.map(|m| f.expected(m)),
                None => m,
            };
            (*d, e)
        })
        .collect()
}
