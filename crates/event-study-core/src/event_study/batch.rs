use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

use super::abnormal_returns::StandardWindow;
use super::analyzer::{EventResult, EventStudy, MetricColumn};
use super::price_history::PriceHistory;
use crate::descriptive::{self, MetricSummary};
use crate::error::EventStudyError;
use crate::types::{EventRecord, EventType};

// ---------------------------------------------------------------------------
// Batch analysis
// ---------------------------------------------------------------------------

/// An event whose analysis raised an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFailure {
    pub ticker: String,
    pub event_date: NaiveDate,
    pub event_type: EventType,
    pub error: String,
}

impl fmt::Display for EventFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({}): {}",
            self.ticker, self.event_date, self.event_type, self.error
        )
    }
}

/// Outcome for one input event of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Analyzed(EventResult),
    Failed(EventFailure),
}

/// Batch outcome, one item per input event in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub items: Vec<BatchItem>,
}

impl BatchOutput {
    /// Analysed events (valid or not); failed events are skipped.
    pub fn results(&self) -> impl Iterator<Item = &EventResult> {
        self.items.iter().filter_map(|i| match i {
            BatchItem::Analyzed(r) => Some(r),
            BatchItem::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &EventFailure> {
        self.items.iter().filter_map(|i| match i {
            BatchItem::Failed(f) => Some(f),
            BatchItem::Analyzed(_) => None,
        })
    }

    pub fn into_results(self) -> Vec<EventResult> {
        self.items
            .into_iter()
            .filter_map(|i| match i {
                BatchItem::Analyzed(r) => Some(r),
                BatchItem::Failed(_) => None,
            })
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.results().filter(|r| r.is_valid()).count()
    }
}

impl<'a, H: PriceHistory + ?Sized> EventStudy<'a, H> {
    fn attempt(&self, event: &EventRecord) -> BatchItem {
        match self.analyze_event(event) {
            Ok(result) => BatchItem::Analyzed(result),
            Err(e) => {
                error!(
                    "Error analyzing event {} on {} ({}): {}",
                    event.ticker, event.event_date, event.event_type, e
                );
                BatchItem::Failed(EventFailure {
                    ticker: event.ticker.clone(),
                    event_date: event.event_date,
                    event_type: event.event_type.clone(),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Analyse every event independently. A failing event becomes a
    /// [`BatchItem::Failed`] and does not stop the batch.
    pub fn analyze_all(&self, events: &[EventRecord]) -> BatchOutput {
        let items: Vec<BatchItem> = events.iter().map(|e| self.attempt(e)).collect();
        let output = BatchOutput { items };
        log_batch(&output);
        output
    }
}

#[cfg(feature = "parallel")]
impl<'a, H: PriceHistory + Sync + ?Sized> EventStudy<'a, H> {
    /// [`EventStudy::analyze_all`] across the rayon thread pool. Item order
    /// still follows the input.
    pub fn analyze_all_parallel(&self, events: &[EventRecord]) -> BatchOutput {
        use rayon::prelude::*;

        let items: Vec<BatchItem> = events.par_iter().map(|e| self.attempt(e)).collect();
        let output = BatchOutput { items };
        log_batch(&output);
        output
    }
}

fn log_batch(output: &BatchOutput) {
    let failed = output.failures().count();
    info!(
        "Completed {} event studies ({} valid, {} failed)",
        output.items.len() - failed,
        output.valid_count(),
        failed
    );
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Column used to group results for aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    EventType,
    Ticker,
}

impl GroupBy {
    pub fn key(&self, result: &EventResult) -> String {
        match self {
            GroupBy::EventType => result.event_type.to_string(),
            GroupBy::Ticker => result.ticker.clone(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::EventType => "event_type",
            GroupBy::Ticker => "ticker",
        }
    }
}

impl FromStr for GroupBy {
    type Err = EventStudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_type" => Ok(GroupBy::EventType),
            "ticker" => Ok(GroupBy::Ticker),
            other => Err(EventStudyError::UnknownColumn(other.to_string())),
        }
    }
}

/// Summary statistics of one group of valid results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub group: String,
    pub ar_day_0: MetricSummary,
    /// Mean of the per-event mean abnormal returns.
    pub mean_ar: Option<f64>,
    /// Only windows present in at least one valid result appear.
    pub cars: BTreeMap<StandardWindow, MetricSummary>,
}

/// Group valid results by `group_by` and summarise each group. Invalid
/// results are ignored; a group with no valid result produces no row.
pub fn aggregate(results: &[EventResult], group_by: GroupBy) -> Vec<AggregateRow> {
    let valid: Vec<&EventResult> = results.iter().filter(|r| r.is_valid()).collect();
    if valid.is_empty() {
        if !results.is_empty() {
            warn!("No valid results to aggregate");
        }
        return Vec::new();
    }

    let present: Vec<StandardWindow> = StandardWindow::ALL
        .into_iter()
        .filter(|w| valid.iter().any(|r| r.value(MetricColumn::Car(*w)).is_some()))
        .collect();

    let mut groups: BTreeMap<String, Vec<&EventResult>> = BTreeMap::new();
    for r in valid {
        groups.entry(group_by.key(r)).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            let column = |c: MetricColumn| -> Vec<f64> {
                members.iter().filter_map(|r| r.value(c)).collect()
            };
            let cars = present
                .iter()
                .map(|w| (*w, MetricSummary::of(&column(MetricColumn::Car(*w)))))
                .collect();
            AggregateRow {
                group,
                ar_day_0: MetricSummary::of(&column(MetricColumn::ArDay0)),
                mean_ar: descriptive::mean(&column(MetricColumn::MeanAr)),
                cars,
            }
        })
        .collect()
}
