use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::EventStudyError;
use crate::EventStudyResult;

/// Simple returns expressed as decimals (0.05 = 5%). Never as percentages.
pub type Return = f64;

/// Free-form per-event metadata carried through to the result record.
pub type EventMetadata = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Price data
// ---------------------------------------------------------------------------

/// One daily OHLCV observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    /// Bar where every price field equals `close`. Useful when only closes are known.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Trading-date indexed price history for a single instrument.
///
/// Dates are unique and strictly increasing; the constructor enforces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PriceBar>", into = "Vec<PriceBar>")]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<PriceBar>) -> EventStudyResult<Self> {
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(EventStudyError::InvalidInput {
                    field: "price_series".into(),
                    reason: format!(
                        "Dates must be strictly increasing ({} followed by {})",
                        pair[0].date, pair[1].date
                    ),
                });
            }
        }
        Ok(Self { bars })
    }

    /// Sorts by date and drops repeated dates (first occurrence wins).
    pub fn from_unsorted(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Self { bars }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Row index of `date`, if it is a trading day of this series.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Rows `start..=end` (clamped to the series).
    pub fn rows(&self, start: usize, end: usize) -> PriceSeries {
        if self.bars.is_empty() || start > end || start >= self.bars.len() {
            return PriceSeries::empty();
        }
        let end = end.min(self.bars.len() - 1);
        PriceSeries {
            bars: self.bars[start..=end].to_vec(),
        }
    }

    /// Bars whose date falls in `[start, end]` inclusive.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> PriceSeries {
        PriceSeries {
            bars: self
                .bars
                .iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect(),
        }
    }

    /// Close-to-close simple returns, one per row. The first row has no prior
    /// close and is `None`; a non-finite ratio (zero prior close) is `None` too.
    pub fn returns(&self) -> Vec<(NaiveDate, Option<Return>)> {
        let mut out = Vec::with_capacity(self.bars.len());
        for (i, bar) in self.bars.iter().enumerate() {
            let r = if i == 0 {
                None
            } else {
                let r = bar.close / self.bars[i - 1].close - 1.0;
                r.is_finite().then_some(r)
            };
            out.push((bar.date, r));
        }
        out
    }

    /// Defined returns keyed by date, for reindexing onto another series' dates.
    pub fn return_map(&self) -> BTreeMap<NaiveDate, Return> {
        self.returns()
            .into_iter()
            .filter_map(|(d, r)| r.map(|r| (d, r)))
            .collect()
    }
}

impl TryFrom<Vec<PriceBar>> for PriceSeries {
    type Error = EventStudyError;

    fn try_from(bars: Vec<PriceBar>) -> Result<Self, Self::Error> {
        PriceSeries::new(bars)
    }
}

impl From<PriceSeries> for Vec<PriceBar> {
    fn from(series: PriceSeries) -> Self {
        series.bars
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Category of a software event. The set is open: unknown labels are kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Release,
    CommitSpike,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Release => "release",
            EventType::CommitSpike => "commit_spike",
            EventType::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "release" => EventType::Release,
            "commit_spike" => EventType::CommitSpike,
            _ => EventType::Other(s),
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        EventType::from(s.to_string())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dated event tied to a ticker. Identity is (ticker, event_date, event_type);
/// duplicates are distinct occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ticker: String,
    /// Calendar date; not necessarily a trading day.
    #[serde(alias = "date", deserialize_with = "deserialize_calendar_date")]
    pub event_date: NaiveDate,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: EventMetadata,
}

impl EventRecord {
    pub fn new(ticker: impl Into<String>, event_date: NaiveDate, event_type: EventType) -> Self {
        Self {
            ticker: ticker.into(),
            event_date,
            event_type,
            metadata: EventMetadata::new(),
        }
    }

    /// A software release, tagged with its version label.
    pub fn release(ticker: impl Into<String>, event_date: NaiveDate, tag_name: &str) -> Self {
        Self::new(ticker, event_date, EventType::Release).with_metadata("tag_name", tag_name)
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Parse a calendar date, dropping any time-of-day component.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and `YYYY-MM-DD HH:MM:SS`.
pub fn parse_calendar_date(s: &str) -> EventStudyResult<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(EventStudyError::DateError(format!("Could not parse date: '{}'", s)))
}

fn deserialize_calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_calendar_date(&s).map_err(serde::de::Error::custom)
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_price_series_rejects_unsorted_dates() {
        let bars = vec![
            PriceBar::from_close(d(2024, 1, 3), 10.0),
            PriceBar::from_close(d(2024, 1, 2), 11.0),
        ];
        assert!(PriceSeries::new(bars).is_err());
    }

    #[test]
    fn test_price_series_rejects_duplicate_dates() {
        let bars = vec![
            PriceBar::from_close(d(2024, 1, 2), 10.0),
            PriceBar::from_close(d(2024, 1, 2), 11.0),
        ];
        assert!(PriceSeries::new(bars).is_err());
    }

    #[test]
    fn test_returns_first_row_undefined() {
        let series = PriceSeries::new(vec![
            PriceBar::from_close(d(2024, 1, 2), 100.0),
            PriceBar::from_close(d(2024, 1, 3), 110.0),
            PriceBar::from_close(d(2024, 1, 4), 99.0),
        ])
        .unwrap();
        let r = series.returns();
        assert_eq!(r[0].1, None);
        assert!((r[1].1.unwrap() - 0.10).abs() < 1e-12);
        assert!((r[2].1.unwrap() + 0.10).abs() < 1e-12);
        assert_eq!(series.return_map().len(), 2);
    }

    #[test]
    fn test_rows_clamps_to_series() {
        let series = PriceSeries::from_unsorted(vec![
            PriceBar::from_close(d(2024, 1, 4), 3.0),
            PriceBar::from_close(d(2024, 1, 2), 1.0),
            PriceBar::from_close(d(2024, 1, 3), 2.0),
        ]);
        assert_eq!(series.first_date(), Some(d(2024, 1, 2)));
        assert_eq!(series.rows(1, 10).len(), 2);
        assert!(series.rows(5, 10).is_empty());
    }

    #[test]
    fn test_event_type_round_trips_open_set() {
        assert_eq!(EventType::from("release"), EventType::Release);
        assert_eq!(EventType::from("commit_spike"), EventType::CommitSpike);
        assert_eq!(
            EventType::from("security_advisory"),
            EventType::Other("security_advisory".into())
        );
        assert_eq!(EventType::from("security_advisory").as_str(), "security_advisory");
    }

    #[test]
    fn test_parse_calendar_date_drops_time() {
        assert_eq!(parse_calendar_date("2024-03-09").unwrap(), d(2024, 3, 9));
        assert_eq!(
            parse_calendar_date("2024-03-09T21:15:00Z").unwrap(),
            d(2024, 3, 9)
        );
        assert_eq!(
            parse_calendar_date("2024-03-09 08:00:00").unwrap(),
            d(2024, 3, 9)
        );
        assert!(parse_calendar_date("ninth of march").is_err());
    }

    #[test]
    fn test_event_record_accepts_date_alias() {
        let json = r#"{"ticker":"MSFT","date":"2024-03-09T12:00:00Z","event_type":"release"}"#;
        let ev: EventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(ev.event_date, d(2024, 3, 9));
        assert_eq!(ev.event_type, EventType::Release);
        assert!(ev.metadata.is_empty());
    }
}
