use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::calendar::{align, AlignDirection};
use crate::config::EventStudyConfig;
use crate::types::PriceSeries;
use crate::EventStudyResult;

/// Event and estimation window geometry, in trading days relative to the
/// aligned event day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub pre_days: i64,
    pub post_days: i64,
    pub estimation_start: i64,
    pub estimation_end: i64,
}

impl WindowSpec {
    pub fn from_config(config: &EventStudyConfig) -> Self {
        Self {
            pre_days: config.event_window.pre,
            post_days: config.event_window.post,
            estimation_start: config.estimation_window.start,
            estimation_end: config.estimation_window.end,
        }
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self::from_config(&EventStudyConfig::default())
    }
}

/// Source of stock and market price history.
///
/// Implementations resolve any I/O themselves; the engine only sees
/// in-memory series. An empty series means "no data", an `Err` means the
/// lookup itself failed.
pub trait PriceHistory {
    /// `(event_window, estimation_window)` price slices for one event.
    fn event_window_data(
        &self,
        ticker: &str,
        event_date: NaiveDate,
        window: &WindowSpec,
    ) -> EventStudyResult<(PriceSeries, PriceSeries)>;

    /// Market index prices over `[start, end]` inclusive.
    fn market_data(&self, start: NaiveDate, end: NaiveDate) -> EventStudyResult<PriceSeries>;
}

/// Price history held entirely in memory: one series per ticker plus the
/// market index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceHistory {
    stocks: HashMap<String, PriceSeries>,
    market: PriceSeries,
}

impl InMemoryPriceHistory {
    pub fn new(market: PriceSeries) -> Self {
        Self {
            stocks: HashMap::new(),
            market,
        }
    }

    pub fn insert(&mut self, ticker: impl Into<String>, series: PriceSeries) {
        self.stocks.insert(ticker.into(), series);
    }

    pub fn with_ticker(mut self, ticker: impl Into<String>, series: PriceSeries) -> Self {
        self.insert(ticker, series);
        self
    }

    pub fn stock(&self, ticker: &str) -> Option<&PriceSeries> {
        self.stocks.get(ticker)
    }

    pub fn market(&self) -> &PriceSeries {
        &self.market
    }

    pub fn tickers(&self) -> Vec<&str> {
        let mut t: Vec<&str> = self.stocks.keys().map(|k| k.as_str()).collect();
        t.sort_unstable();
        t
    }
}

impl PriceHistory for InMemoryPriceHistory {
    fn event_window_data(
        &self,
        ticker: &str,
        event_date: NaiveDate,
        window: &WindowSpec,
    ) -> EventStudyResult<(PriceSeries, PriceSeries)> {
        let Some(full) = self.stocks.get(ticker) else {
            warn!("No price history loaded for {}", ticker);
            return Ok((PriceSeries::empty(), PriceSeries::empty()));
        };

        // Nothing before the first bar to align against or estimate from.
        if full.first_date().map_or(true, |first| event_date < first) {
            warn!("Event date {} precedes the price history of {}", event_date, ticker);
            return Ok((PriceSeries::empty(), PriceSeries::empty()));
        }

        // Offsets are trading days, so index the whole series rather than a
        // calendar slice of it.
        let trading_days = full.dates();
        let Some(event_day) = align(event_date, &trading_days, AlignDirection::Forward) else {
            warn!("Could not align event date {} to a trading day for {}", event_date, ticker);
            return Ok((PriceSeries::empty(), PriceSeries::empty()));
        };
        let Some(event_idx) = full.position(event_day) else {
            return Ok((PriceSeries::empty(), PriceSeries::empty()));
        };
        let event_idx = event_idx as i64;

        let event_start = (event_idx - window.pre_days).max(0) as usize;
        let event_end = (event_idx + window.post_days).min(full.len() as i64 - 1) as usize;
        let event_window = full.rows(event_start, event_end);

        let est_start = (event_idx + window.estimation_start).max(0) as usize;
        let est_end = (event_idx + window.estimation_end).max(0) as usize;
        let estimation_window = if est_end > est_start {
            full.rows(est_start, est_end)
        } else {
            PriceSeries::empty()
        };

        debug!(
            "{} {}: event window {} rows, estimation window {} rows",
            ticker,
            event_date,
            event_window.len(),
            estimation_window.len()
        );

        Ok((event_window, estimation_window))
    }

    fn market_data(&self, start: NaiveDate, end: NaiveDate) -> EventStudyResult<PriceSeries> {
        Ok(self.market.between(start, end))
    }
}
