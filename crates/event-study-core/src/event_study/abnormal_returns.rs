use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::calendar::{align, AlignDirection};
use super::expected_returns::{expected_returns, ExpectedReturnModel};
use super::market_model::MarketModelFit;
use super::price_history::{PriceHistory, WindowSpec};
use crate::error::EventStudyError;
use crate::types::Return;
use crate::EventStudyResult;

/// Calendar padding on each side of the market-data request.
const MARKET_BUFFER_DAYS: i64 = 10;

pub const REASON_INSUFFICIENT_DATA: &str = "Insufficient data";
pub const REASON_UNALIGNED: &str = "Event date could not be aligned to a trading day";

/// One event-window trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalReturnRow {
    pub date: NaiveDate,
    pub actual_return: Option<Return>,
    pub expected_return: Option<Return>,
    /// actual - expected; `None` unless both are present.
    pub abnormal_return: Option<Return>,
    /// Trading-day offset from the aligned event day (0 = event day).
    pub event_time: i64,
    pub ticker: String,
    pub event_date: NaiveDate,
}

/// Outcome of the abnormal-return computation for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowReturns {
    Computed {
        rows: Vec<AbnormalReturnRow>,
        /// Market-model parameters, when that model was fitted.
        fit: Option<MarketModelFit>,
    },
    Unavailable {
        reason: String,
    },
}

impl WindowReturns {
    pub fn rows(&self) -> &[AbnormalReturnRow] {
        match self {
            WindowReturns::Computed { rows, .. } => rows,
            WindowReturns::Unavailable { .. } => &[],
        }
    }

    fn unavailable(reason: &str) -> Self {
        WindowReturns::Unavailable {
            reason: reason.to_string(),
        }
    }
}

/// Abnormal returns for every event-window day of `ticker` around `event_date`.
///
/// Missing event-window or market data is reported as
/// [`WindowReturns::Unavailable`]; only a failing price lookup is an `Err`.
pub fn abnormal_returns<H: PriceHistory + ?Sized>(
    history: &H,
    ticker: &str,
    event_date: NaiveDate,
    window: &WindowSpec,
    model: ExpectedReturnModel,
) -> EventStudyResult<WindowReturns> {
    let (event_window, estimation_window) = history.event_window_data(ticker, event_date, window)?;

    let (Some(first_event_day), Some(last_event_day)) =
        (event_window.first_date(), event_window.last_date())
    else {
        warn!("No event window data for {} on {}", ticker, event_date);
        return Ok(WindowReturns::unavailable(REASON_INSUFFICIENT_DATA));
    };

    let span_start = estimation_window.first_date().unwrap_or(first_event_day);
    let market = history.market_data(
        span_start - Duration::days(MARKET_BUFFER_DAYS),
        last_event_day + Duration::days(MARKET_BUFFER_DAYS),
    )?;
    if market.is_empty() {
        warn!("No market data available for {} on {}", ticker, event_date);
        return Ok(WindowReturns::unavailable(REASON_INSUFFICIENT_DATA));
    }

    let trading_days = event_window.dates();
    let Some(event_day) = align(event_date, &trading_days, AlignDirection::Forward) else {
        warn!("Could not align {} to the event window of {}", event_date, ticker);
        return Ok(WindowReturns::unavailable(REASON_UNALIGNED));
    };
    let event_idx = trading_days
        .iter()
        .position(|d| *d == event_day)
        .unwrap_or_default() as i64;

    let expected = expected_returns(&event_window, &estimation_window, &market, model);
    let actual = event_window.returns();

    let rows = actual
        .into_iter()
        .zip(expected.values)
        .enumerate()
        .map(|(i, ((date, actual_return), (_, expected_return)))| {
            let abnormal_return = match (actual_return, expected_return) {
                (Some(a), Some(e)) => Some(a - e),
                _ => None,
            };
            AbnormalReturnRow {
                date,
                actual_return,
                expected_return,
                abnormal_return,
                event_time: i as i64 - event_idx,
                ticker: ticker.to_string(),
                event_date,
            }
        })
        .collect();

    Ok(WindowReturns::Computed {
        rows,
        fit: expected.fit,
    })
}

/// A running-CAR observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarPoint {
    pub date: NaiveDate,
    pub event_time: i64,
    pub abnormal_return: Return,
    pub car: Return,
}

/// Running cumulative abnormal return over event times in
/// `[start_day, end_day]` (unbounded above when `end_day` is `None`).
/// Rows without an abnormal return are skipped.
pub fn cumulative(
    rows: &[AbnormalReturnRow],
    start_day: i64,
    end_day: Option<i64>,
) -> Vec<CarPoint> {
    let mut selected: Vec<&AbnormalReturnRow> = rows
        .iter()
        .filter(|r| r.event_time >= start_day && end_day.map_or(true, |e| r.event_time <= e))
        .filter(|r| r.abnormal_return.is_some())
        .collect();
    selected.sort_by_key(|r| r.event_time);

    let mut running = 0.0;
    selected
        .into_iter()
        .filter_map(|r| {
            let ar = r.abnormal_return?;
            running += ar;
            Some(CarPoint {
                date: r.date,
                event_time: r.event_time,
                abnormal_return: ar,
                car: running,
            })
        })
        .collect()
}

/// CAR over `[start_day, end_day]`: the last running value, or `None` when
/// the window holds no abnormal returns.
pub fn car(rows: &[AbnormalReturnRow], start_day: i64, end_day: Option<i64>) -> Option<Return> {
    cumulative(rows, start_day, end_day).last().map(|p| p.car)
}

/// The CAR windows evaluated for every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StandardWindow {
    #[serde(rename = "CAR_0_0")]
    Car0To0,
    #[serde(rename = "CAR_0_1")]
    Car0To1,
    #[serde(rename = "CAR_-1_1")]
    CarM1To1,
    #[serde(rename = "CAR_0_5")]
    Car0To5,
    #[serde(rename = "CAR_-5_5")]
    CarM5To5,
}

impl StandardWindow {
    pub const ALL: [StandardWindow; 5] = [
        StandardWindow::Car0To0,
        StandardWindow::Car0To1,
        StandardWindow::CarM1To1,
        StandardWindow::Car0To5,
        StandardWindow::CarM5To5,
    ];

    /// Inclusive event-time bounds.
    pub fn bounds(&self) -> (i64, i64) {
        match self {
            StandardWindow::Car0To0 => (0, 0),
            StandardWindow::Car0To1 => (0, 1),
            StandardWindow::CarM1To1 => (-1, 1),
            StandardWindow::Car0To5 => (0, 5),
            StandardWindow::CarM5To5 => (-5, 5),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            StandardWindow::Car0To0 => "CAR_0_0",
            StandardWindow::Car0To1 => "CAR_0_1",
            StandardWindow::CarM1To1 => "CAR_-1_1",
            StandardWindow::Car0To5 => "CAR_0_5",
            StandardWindow::CarM5To5 => "CAR_-5_5",
        }
    }

    pub fn evaluate(&self, rows: &[AbnormalReturnRow]) -> Option<Return> {
        let (a, b) = self.bounds();
        car(rows, a, Some(b))
    }

    /// Rows inside the window that carry an abnormal return.
    pub fn observations(&self, rows: &[AbnormalReturnRow]) -> usize {
        let (a, b) = self.bounds();
        rows.iter()
            .filter(|r| r.event_time >= a && r.event_time <= b && r.abnormal_return.is_some())
            .count()
    }
}

impl FromStr for StandardWindow {
    type Err = EventStudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StandardWindow::ALL
            .into_iter()
            .find(|w| w.column() == s)
            .ok_or_else(|| EventStudyError::UnknownColumn(s.to_string()))
    }
}

impl fmt::Display for StandardWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ars: &[(i64, Option<f64>)]) -> Vec<AbnormalReturnRow> {
        let base = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        ars.iter()
            .map(|(t, ar)| AbnormalReturnRow {
                date: base + Duration::days(*t + 10),
                actual_return: *ar,
                expected_return: ar.map(|_| 0.0),
                abnormal_return: *ar,
                event_time: *t,
                ticker: "ACME".into(),
                event_date: base + Duration::days(10),
            })
            .collect()
    }

    #[test]
    fn test_car_single_day_equals_day_zero_ar() {
        let r = rows(&[(-1, Some(0.01)), (0, Some(0.025)), (1, Some(-0.004))]);
        assert_eq!(StandardWindow::Car0To0.evaluate(&r), Some(0.025));
    }

    #[test]
    fn test_cumulative_running_sum_in_event_time_order() {
        // deliberately out of order
        let r = rows(&[(1, Some(0.02)), (-1, Some(0.01)), (0, Some(0.03))]);
        let c = cumulative(&r, -1, Some(1));
        let times: Vec<i64> = c.iter().map(|p| p.event_time).collect();
        assert_eq!(times, vec![-1, 0, 1]);
        assert!((c[1].car - 0.04).abs() < 1e-12);
        assert!((c[2].car - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_car_extension_equals_sum_of_added_days() {
        let r = rows(&[
            (-2, Some(0.003)),
            (0, Some(0.01)),
            (1, Some(-0.02)),
            (2, Some(0.005)),
            (3, Some(0.007)),
        ]);
        let c1 = car(&r, 0, Some(1)).unwrap();
        let c3 = car(&r, 0, Some(3)).unwrap();
        assert!((c3 - c1 - (0.005 + 0.007)).abs() < 1e-12);
    }

    #[test]
    fn test_open_ended_window() {
        let r = rows(&[(0, Some(0.01)), (4, Some(0.02)), (9, Some(0.03))]);
        assert!((car(&r, 1, None).unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_missing_rows_skipped_and_empty_window_absent() {
        let r = rows(&[(-5, None), (-4, Some(0.01)), (0, None)]);
        assert_eq!(StandardWindow::Car0To0.evaluate(&r), None);
        assert_eq!(StandardWindow::CarM5To5.evaluate(&r), Some(0.01));
        assert_eq!(StandardWindow::Car0To5.evaluate(&[]), None);
    }

    #[test]
    fn test_observations_count_only_summed_rows() {
        let r = rows(&[(-5, None), (-4, Some(0.01)), (0, Some(0.02)), (1, None), (6, Some(0.03))]);
        assert_eq!(StandardWindow::CarM5To5.observations(&r), 2);
        assert_eq!(StandardWindow::Car0To1.observations(&r), 1);
        assert_eq!(StandardWindow::CarM1To1.observations(&[]), 0);
    }

    #[test]
    fn test_window_columns_parse() {
        assert_eq!("CAR_-1_1".parse::<StandardWindow>().unwrap(), StandardWindow::CarM1To1);
        assert!("CAR_2_2".parse::<StandardWindow>().is_err());
        assert_eq!(StandardWindow::CarM5To5.bounds(), (-5, 5));
    }
}
