use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use tracing::{debug, info, warn};

use event_study_core::event_study::InMemoryPriceHistory;
use event_study_core::{parse_calendar_date, EventStudyError, PriceBar, PriceSeries};

use super::file;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume", default)]
    volume: f64,
}

/// Parse `date,open,high,low,close,volume` rows. Unparseable rows are
/// skipped; the series is sorted and repeated dates dropped.
pub fn parse_price_csv<R: Read>(reader: R) -> Result<PriceSeries, Box<dyn std::error::Error>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    let mut skipped = 0;
    for (row_num, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("Skipping price row {}: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
        };
        let date = match parse_calendar_date(&row.date) {
            Ok(d) => d,
            Err(e) => {
                debug!("Skipping price row {}: {}", row_num + 1, e);
                skipped += 1;
                continue;
            }
        };
        bars.push(PriceBar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    if skipped > 0 {
        warn!("Skipped {} invalid price rows", skipped);
    }
    Ok(PriceSeries::from_unsorted(bars))
}

pub fn load_price_csv(path: &str) -> Result<PriceSeries, Box<dyn std::error::Error>> {
    let canonical = file::resolve_file(path)?;
    info!("Loading prices from: {}", canonical.display());
    let f = File::open(&canonical).map_err(|e| {
        EventStudyError::PriceData(format!("Failed to read '{}': {}", canonical.display(), e))
    })?;
    parse_price_csv(f)
}

/// Market series from `market` plus `<prices_dir>/<TICKER>.csv` for every
/// ticker. A ticker without a file is left out (its events come back
/// invalid for lack of data).
pub fn load_history<'a>(
    prices_dir: &str,
    market: &str,
    tickers: impl IntoIterator<Item = &'a str>,
) -> Result<InMemoryPriceHistory, Box<dyn std::error::Error>> {
    let dir = file::resolve_dir(prices_dir)?;
    let market_series = load_price_csv(market)?;
    if market_series.is_empty() {
        return Err(EventStudyError::PriceData(format!("No market prices in '{}'", market)).into());
    }
    let mut history = InMemoryPriceHistory::new(market_series);

    for ticker in tickers {
        if history.stock(ticker).is_some() {
            continue;
        }
        let path = dir.join(format!("{}.csv", ticker));
        if !path.is_file() {
            warn!("No price file for {} at {}", ticker, path.display());
            continue;
        }
        let series = load_price_csv(&path.to_string_lossy())?;
        history.insert(ticker, series);
    }
    Ok(history)
}
