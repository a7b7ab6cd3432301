use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::abnormal_returns::{
    abnormal_returns, StandardWindow, WindowReturns, REASON_INSUFFICIENT_DATA,
};
use super::expected_returns::ExpectedReturnModel;
use super::price_history::{PriceHistory, WindowSpec};
use crate::config::EventStudyConfig;
use crate::descriptive;
use crate::error::EventStudyError;
use crate::types::{EventMetadata, EventRecord, EventType, Return};
use crate::EventStudyResult;

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// CAR for each standard window; a window with no abnormal returns is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarWindows {
    #[serde(rename = "CAR_0_0", default, skip_serializing_if = "Option::is_none")]
    pub car_0_0: Option<Return>,
    #[serde(rename = "CAR_0_1", default, skip_serializing_if = "Option::is_none")]
    pub car_0_1: Option<Return>,
    #[serde(rename = "CAR_-1_1", default, skip_serializing_if = "Option::is_none")]
    pub car_m1_1: Option<Return>,
    #[serde(rename = "CAR_0_5", default, skip_serializing_if = "Option::is_none")]
    pub car_0_5: Option<Return>,
    #[serde(rename = "CAR_-5_5", default, skip_serializing_if = "Option::is_none")]
    pub car_m5_5: Option<Return>,
}

impl CarWindows {
    pub fn get(&self, window: StandardWindow) -> Option<Return> {
        match window {
            StandardWindow::Car0To0 => self.car_0_0,
            StandardWindow::Car0To1 => self.car_0_1,
            StandardWindow::CarM1To1 => self.car_m1_1,
            StandardWindow::Car0To5 => self.car_0_5,
            StandardWindow::CarM5To5 => self.car_m5_5,
        }
    }

    fn slot(&mut self, window: StandardWindow) -> &mut Option<Return> {
        match window {
            StandardWindow::Car0To0 => &mut self.car_0_0,
            StandardWindow::Car0To1 => &mut self.car_0_1,
            StandardWindow::CarM1To1 => &mut self.car_m1_1,
            StandardWindow::Car0To5 => &mut self.car_0_5,
            StandardWindow::CarM5To5 => &mut self.car_m5_5,
        }
    }

    fn from_rows(rows: &[super::AbnormalReturnRow]) -> Self {
        let mut cars = CarWindows::default();
        for window in StandardWindow::ALL {
            *cars.slot(window) = window.evaluate(rows);
        }
        cars
    }
}

/// Metrics of a successfully analysed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetrics {
    /// Abnormal return at event time 0; `None` if that row has no AR.
    pub ar_day_0: Option<Return>,
    pub mean_ar: Option<Return>,
    pub median_ar: Option<Return>,
    pub std_ar: Option<Return>,
    #[serde(flatten)]
    pub cars: CarWindows,
    /// Abnormal returns actually summed into each CAR window.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub car_observations: BTreeMap<StandardWindow, usize>,
    /// Market-model standard error of estimate, when the model was fitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_std: Option<f64>,
    #[serde(default)]
    pub metadata: EventMetadata,
    /// Rows in the event window.
    pub num_observations: usize,
}

impl EventMetrics {
    /// Variance of a window's CAR under the market model: L * sigma^2, with
    /// L the number of abnormal returns summed into that CAR.
    pub fn car_variance(&self, window: StandardWindow) -> Option<f64> {
        let sigma = self.residual_std?;
        self.cars.get(window)?;
        let summed = *self.car_observations.get(&window).filter(|n| **n > 0)?;
        Some(summed as f64 * sigma * sigma)
    }
}

fn car_observations(rows: &[super::AbnormalReturnRow]) -> BTreeMap<StandardWindow, usize> {
    StandardWindow::ALL
        .into_iter()
        .map(|w| (w, w.observations(rows)))
        .filter(|(_, n)| *n > 0)
        .collect()
}

/// Per-event outcome. `valid` events carry metrics, invalid ones a reason;
/// the constructors and the deserializer are the only ways to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventResultRecord")]
pub struct EventResult {
    pub ticker: String,
    pub event_date: NaiveDate,
    pub event_type: EventType,
    valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(flatten)]
    metrics: Option<EventMetrics>,
}

/// Wire form of [`EventResult`]. Metric fields are kept raw so that a
/// malformed valid record fails instead of loading without metrics.
#[derive(Deserialize)]
struct EventResultRecord {
    ticker: String,
    event_date: NaiveDate,
    event_type: EventType,
    valid: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl TryFrom<EventResultRecord> for EventResult {
    type Error = EventStudyError;

    fn try_from(r: EventResultRecord) -> Result<Self, Self::Error> {
        if !r.valid {
            let reason = r.reason.ok_or_else(|| EventStudyError::InvalidInput {
                field: "reason".into(),
                reason: format!("invalid result for {} on {} has no reason", r.ticker, r.event_date),
            })?;
            return Ok(Self::invalid(&r.ticker, r.event_date, r.event_type, &reason));
        }

        let metrics = EventMetrics::deserialize(serde_json::Value::Object(r.rest)).map_err(|e| {
            EventStudyError::SerializationError(format!(
                "valid result for {} on {} has malformed metrics: {}",
                r.ticker, r.event_date, e
            ))
        })?;
        Ok(Self::valid(&r.ticker, r.event_date, r.event_type, metrics))
    }
}

impl EventResult {
    pub fn valid(ticker: &str, event_date: NaiveDate, event_type: EventType, metrics: EventMetrics) -> Self {
        Self {
            ticker: ticker.to_string(),
            event_date,
            event_type,
            valid: true,
            reason: None,
            metrics: Some(metrics),
        }
    }

    pub fn invalid(ticker: &str, event_date: NaiveDate, event_type: EventType, reason: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            event_date,
            event_type,
            valid: false,
            reason: Some(reason.to_string()),
            metrics: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn metrics(&self) -> Option<&EventMetrics> {
        self.metrics.as_ref()
    }

    /// Value of `column`, or `None` when the event is invalid or the value
    /// is undefined.
    pub fn value(&self, column: MetricColumn) -> Option<f64> {
        let m = self.metrics.as_ref()?;
        match column {
            MetricColumn::ArDay0 => m.ar_day_0,
            MetricColumn::MeanAr => m.mean_ar,
            MetricColumn::MedianAr => m.median_ar,
            MetricColumn::StdAr => m.std_ar,
            MetricColumn::Car(w) => m.cars.get(w),
        }
    }
}

/// A numeric column of the per-event result table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MetricColumn {
    #[default]
    ArDay0,
    MeanAr,
    MedianAr,
    StdAr,
    Car(StandardWindow),
}

impl MetricColumn {
    pub fn name(&self) -> &'static str {
        match self {
            MetricColumn::ArDay0 => "ar_day_0",
            MetricColumn::MeanAr => "mean_ar",
            MetricColumn::MedianAr => "median_ar",
            MetricColumn::StdAr => "std_ar",
            MetricColumn::Car(w) => w.column(),
        }
    }
}

impl FromStr for MetricColumn {
    type Err = EventStudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ar_day_0" => Ok(MetricColumn::ArDay0),
            "mean_ar" => Ok(MetricColumn::MeanAr),
            "median_ar" => Ok(MetricColumn::MedianAr),
            "std_ar" => Ok(MetricColumn::StdAr),
            other => other.parse::<StandardWindow>().map(MetricColumn::Car),
        }
    }
}

impl TryFrom<String> for MetricColumn {
    type Error = EventStudyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MetricColumn> for String {
    fn from(c: MetricColumn) -> Self {
        c.name().to_string()
    }
}

impl fmt::Display for MetricColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Single-event analyzer bound to a price-history source and a configuration.
pub struct EventStudy<'a, H: PriceHistory + ?Sized> {
    history: &'a H,
    window: WindowSpec,
    model: ExpectedReturnModel,
}

impl<'a, H: PriceHistory + ?Sized> EventStudy<'a, H> {
    /// Fails if the configured expected-return model is unknown.
    pub fn new(config: &EventStudyConfig, history: &'a H) -> EventStudyResult<Self> {
        Ok(Self {
            history,
            window: WindowSpec::from_config(config),
            model: config.expected_return_model.parse()?,
        })
    }

    pub fn with_model(mut self, model: ExpectedReturnModel) -> Self {
        self.model = model;
        self
    }

    pub fn window(&self) -> &WindowSpec {
        &self.window
    }

    pub fn model(&self) -> ExpectedReturnModel {
        self.model
    }

    /// Abnormal-return table for one event with the configured windows and model.
    pub fn abnormal_returns(&self, ticker: &str, event_date: NaiveDate) -> EventStudyResult<WindowReturns> {
        abnormal_returns(self.history, ticker, event_date, &self.window, self.model)
    }

    /// Analyse one event. Insufficient data yields an invalid result; only a
    /// failing price lookup is an `Err`.
    pub fn analyze(
        &self,
        ticker: &str,
        event_date: NaiveDate,
        event_type: EventType,
        metadata: EventMetadata,
    ) -> EventStudyResult<EventResult> {
        info!("Analyzing event: {} on {} ({})", ticker, event_date, event_type);

        let (rows, fit) = match self.abnormal_returns(ticker, event_date)? {
            WindowReturns::Computed { rows, fit } => (rows, fit),
            WindowReturns::Unavailable { reason } => {
                return Ok(EventResult::invalid(ticker, event_date, event_type, &reason));
            }
        };

        let ars: Vec<f64> = rows.iter().filter_map(|r| r.abnormal_return).collect();
        if ars.is_empty() {
            return Ok(EventResult::invalid(
                ticker,
                event_date,
                event_type,
                REASON_INSUFFICIENT_DATA,
            ));
        }

        let ar_day_0 = rows
            .iter()
            .find(|r| r.event_time == 0)
            .and_then(|r| r.abnormal_return);

        let metrics = EventMetrics {
            ar_day_0,
            mean_ar: descriptive::mean(&ars),
            median_ar: descriptive::median(&ars),
            std_ar: descriptive::std_dev(&ars),
            cars: CarWindows::from_rows(&rows),
            car_observations: car_observations(&rows),
            residual_std: fit.and_then(|f| f.residual_std),
            metadata,
            num_observations: rows.len(),
        };

        Ok(EventResult::valid(ticker, event_date, event_type, metrics))
    }

    pub fn analyze_event(&self, event: &EventRecord) -> EventStudyResult<EventResult> {
        self.analyze(
            &event.ticker,
            event.event_date,
            event.event_type.clone(),
            event.metadata.clone(),
        )
    }
}
