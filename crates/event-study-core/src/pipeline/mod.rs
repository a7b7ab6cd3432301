//! End-to-end run: filter the event list, analyse every event, aggregate
//! and test the results.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::EventStudyConfig;
use crate::descriptive;
use crate::event_study::batch::aggregate;
use crate::event_study::{
    AggregateRow, BatchOutput, EventResult, EventStudy, GroupBy, MetricColumn, PriceHistory,
    StandardWindow,
};
use crate::events::filter_events;
use crate::statistics::{SignificanceLevel, StatisticalTests, SummaryRow, TestBattery, TestResult};
use crate::types::{with_metadata, ComputationOutput, EventRecord};
use crate::EventStudyResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStatistics {
    pub mean_ar_day_0: Option<f64>,
    pub median_ar_day_0: Option<f64>,
    #[serde(rename = "mean_CAR_-5_5")]
    pub mean_car_m5_5: Option<f64>,
    /// Share of valid events with a positive day-0 abnormal return, in percent.
    pub pct_positive_ar: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceEntry {
    pub test: String,
    pub significant: bool,
    pub p_value: f64,
    pub significance_level: SignificanceLevel,
}

/// Headline numbers of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_events: usize,
    pub total_companies: usize,
    /// Distinct `repo` metadata values among the analysed events.
    pub total_repositories: usize,
    pub valid_event_studies: usize,
    pub event_types: BTreeMap<String, usize>,
    pub overall_statistics: OverallStatistics,
    /// Valid tests only, in battery order.
    pub statistical_significance: Vec<SignificanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub input_events: usize,
    pub filtered_events: usize,
    pub batch: BatchOutput,
    pub by_event_type: Vec<AggregateRow>,
    pub by_ticker: Vec<AggregateRow>,
    pub tests: TestBattery,
    /// Inverse-variance weighted CAR tests, per standard window, using the
    /// market-model residual variance of each event.
    pub weighted_car_tests: BTreeMap<StandardWindow, TestResult>,
    pub test_summary: Vec<SummaryRow>,
    pub summary: RunSummary,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run a complete event study over `events`.
///
/// Events are filtered by the `analysis` settings, optionally sampled down
/// to `analysis.max_events` with the configured seed (input order kept),
/// analysed independently, aggregated by event type and ticker, and tested
/// over `ar_day_0`. Failed and invalid events are reported as warnings.
pub fn run_event_study<H: PriceHistory + Sync + ?Sized>(
    config: &EventStudyConfig,
    history: &H,
    events: &[EventRecord],
) -> EventStudyResult<ComputationOutput<PipelineOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    config.validate()?;
    let study = EventStudy::new(config, history)?;
    let tests = StatisticalTests::new(config);

    info!("Running event study pipeline over {} events", events.len());
    let filtered = filter_events(
        events,
        config.analysis.min_events_per_company,
        config.analysis.min_days_between,
    );
    if filtered.is_empty() && !events.is_empty() {
        warnings.push(format!(
            "No events left after filtering (min {} events per company)",
            config.analysis.min_events_per_company
        ));
    }
    let selected = sample_events(&filtered, config.analysis.max_events, config.analysis.sample_seed);

    #[cfg(feature = "parallel")]
    let batch = study.analyze_all_parallel(&selected);
    #[cfg(not(feature = "parallel"))]
    let batch = study.analyze_all(&selected);

    for failure in batch.failures() {
        warnings.push(format!("Event failed: {}", failure));
    }
    let results: Vec<EventResult> = batch.results().cloned().collect();
    let invalid = results.iter().filter(|r| !r.is_valid()).count();
    if invalid > 0 {
        warnings.push(format!("{} of {} events had insufficient data", invalid, results.len()));
    }

    let by_event_type = aggregate(&results, GroupBy::EventType);
    let by_ticker = aggregate(&results, GroupBy::Ticker);

    let battery = tests.perform_all_tests(&results, MetricColumn::ArDay0);
    let weighted_car_tests = weighted_car_tests(&tests, &results);
    let test_summary = tests.summary_table(&battery);
    let summary = summarize(&selected, &results, &battery);

    let output = PipelineOutput {
        input_events: events.len(),
        filtered_events: filtered.len(),
        batch,
        by_event_type,
        by_ticker,
        tests: battery,
        weighted_car_tests,
        test_summary,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &format!("Event study ({} expected-return model)", study.model()),
        config,
        warnings,
        elapsed,
        output,
    ))
}

/// Seeded sample of at most `max_events` events, in input order.
pub fn sample_events(events: &[EventRecord], max_events: Option<usize>, seed: u64) -> Vec<EventRecord> {
    match max_events {
        Some(max) if events.len() > max => {
            info!("Limiting to {} of {} events for analysis", max, events.len());
            let mut rng = StdRng::seed_from_u64(seed);
            let mut picked = rand::seq::index::sample(&mut rng, events.len(), max).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|i| events[i].clone()).collect()
        }
        _ => events.to_vec(),
    }
}

fn weighted_car_tests(
    tests: &StatisticalTests,
    results: &[EventResult],
) -> BTreeMap<StandardWindow, TestResult> {
    let valid: Vec<&EventResult> = results.iter().filter(|r| r.is_valid()).collect();
    StandardWindow::ALL
        .into_iter()
        .filter_map(|w| {
            let cars: Vec<Option<f64>> =
                valid.iter().map(|r| r.value(MetricColumn::Car(w))).collect();
            if cars.iter().all(Option::is_none) {
                return None;
            }
            let variances: Vec<Option<f64>> = valid
                .iter()
                .map(|r| r.metrics().and_then(|m| m.car_variance(w)))
                .collect();
            Some((w, tests.car_significance_test(&cars, Some(&variances))))
        })
        .collect()
}

fn summarize(events: &[EventRecord], results: &[EventResult], battery: &TestBattery) -> RunSummary {
    let valid: Vec<&EventResult> = results.iter().filter(|r| r.is_valid()).collect();
    if valid.is_empty() && !results.is_empty() {
        warn!("No valid event studies in this run");
    }

    let mut event_types: BTreeMap<String, usize> = BTreeMap::new();
    for e in events {
        *event_types.entry(e.event_type.to_string()).or_default() += 1;
    }
    let companies: BTreeSet<&str> = events.iter().map(|e| e.ticker.as_str()).collect();
    let repos: BTreeSet<&str> = events
        .iter()
        .filter_map(|e| e.metadata.get("repo").and_then(|v| v.as_str()))
        .collect();

    let day0: Vec<f64> = valid.iter().filter_map(|r| r.value(MetricColumn::ArDay0)).collect();
    let car_m5_5: Vec<f64> = valid
        .iter()
        .filter_map(|r| r.value(MetricColumn::Car(StandardWindow::CarM5To5)))
        .collect();
    let pct_positive_ar = (!day0.is_empty())
        .then(|| day0.iter().filter(|v| **v > 0.0).count() as f64 / day0.len() as f64 * 100.0);

    let statistical_significance = battery
        .iter()
        .filter_map(|(name, r)| {
            let o = r.outcome.as_ref().filter(|_| r.valid)?;
            Some(SignificanceEntry {
                test: name.to_string(),
                significant: o.significant,
                p_value: o.p_value,
                significance_level: o.significance_level,
            })
        })
        .collect();

    RunSummary {
        total_events: events.len(),
        total_companies: companies.len(),
        total_repositories: repos.len(),
        valid_event_studies: valid.len(),
        event_types,
        overall_statistics: OverallStatistics {
            mean_ar_day_0: descriptive::mean(&day0),
            median_ar_day_0: descriptive::median(&day0),
            mean_car_m5_5: descriptive::mean(&car_m5_5),
            pct_positive_ar,
        },
        statistical_significance,
    }
}
