#![cfg(feature = "pipeline")]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use pretty_assertions::assert_eq;

use event_study_core::event_study::{InMemoryPriceHistory, StandardWindow};
use event_study_core::pipeline::{run_event_study, sample_events};
use event_study_core::{EventRecord, EventStudyConfig, EventType, PriceBar, PriceSeries};

// ---------------------------------------------------------------------------
// Synthetic data
// ---------------------------------------------------------------------------

fn trading_days(n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

fn market_return(t: usize) -> f64 {
    0.012 * (t as f64 * 0.37).sin() + 0.003 * (t as f64 * 2.1).cos()
}

fn series(days: &[NaiveDate], returns: impl Fn(usize) -> f64) -> PriceSeries {
    let mut close = 100.0;
    let bars = days
        .iter()
        .enumerate()
        .map(|(t, d)| {
            if t > 0 {
                close *= 1.0 + returns(t);
            }
            PriceBar::from_close(*d, close)
        })
        .collect();
    PriceSeries::new(bars).unwrap()
}

/// Stock with idiosyncratic wobble so the market model has a residual.
fn stock(days: &[NaiveDate], beta: f64, phase: f64, jumps: &[usize]) -> PriceSeries {
    series(days, |t| {
        let jump = if jumps.contains(&t) { 0.03 } else { 0.0 };
        0.0003 + beta * market_return(t) + 0.004 * (t as f64 * 2.9 + phase).sin() + jump
    })
}

const ACME_DAYS: [usize; 5] = [150, 200, 250, 300, 350];
const INIT_DAYS: [usize; 5] = [160, 210, 260, 310, 360];

struct Fixture {
    days: Vec<NaiveDate>,
    history: InMemoryPriceHistory,
}

fn fixture() -> Fixture {
    let days = trading_days(420);
    let history = InMemoryPriceHistory::new(series(&days, market_return))
        .with_ticker("ACME", stock(&days, 1.2, 0.0, &ACME_DAYS))
        .with_ticker("INIT", stock(&days, 0.7, 1.3, &INIT_DAYS))
        .with_ticker("SMALL", stock(&days, 1.0, 2.2, &[]));
    Fixture { days, history }
}

fn event_list(days: &[NaiveDate]) -> Vec<EventRecord> {
    let mut events = Vec::new();
    for (i, idx) in ACME_DAYS.iter().enumerate() {
        events.push(
            EventRecord::release("ACME", days[*idx], &format!("v1.{}.0", i))
                .with_metadata("repo", "acme/core"),
        );
    }
    // same day as an earlier ACME event: dropped by the spacing filter
    events.push(EventRecord::new("ACME", days[ACME_DAYS[0]], EventType::CommitSpike));
    for idx in INIT_DAYS {
        events.push(
            EventRecord::new("INIT", days[idx], EventType::CommitSpike)
                .with_metadata("repo", "init/engine"),
        );
    }
    // too few events for the company filter
    events.push(EventRecord::release("SMALL", days[200], "v0.1.0"));
    events.push(EventRecord::release("SMALL", days[300], "v0.2.0"));
    // enough events but no prices
    for idx in [170, 220, 270, 320, 370] {
        events.push(EventRecord::new("GHOST", days[idx], EventType::Release));
    }
    events
}

// ---------------------------------------------------------------------------
// End-to-end run
// ---------------------------------------------------------------------------

#[test]
fn test_full_run_counts_and_envelope() {
    let f = fixture();
    let events = event_list(&f.days);
    let out = run_event_study(&EventStudyConfig::default(), &f.history, &events).unwrap();

    assert_eq!(out.metadata.precision, "ieee754_f64");
    assert_eq!(out.methodology, "Event study (market expected-return model)");

    let r = &out.result;
    assert_eq!(r.input_events, 18);
    assert_eq!(r.filtered_events, 15);
    assert_eq!(r.batch.items.len(), 15);
    assert_eq!(r.batch.failures().count(), 0);
    assert_eq!(r.batch.valid_count(), 10);

    assert!(out
        .warnings
        .iter()
        .any(|w| w == "5 of 15 events had insufficient data"));

    assert_eq!(r.summary.total_events, 15);
    assert_eq!(r.summary.total_companies, 3);
    assert_eq!(r.summary.total_repositories, 2);
    assert_eq!(r.summary.valid_event_studies, 10);
    assert_eq!(r.summary.event_types["release"], 10);
    assert_eq!(r.summary.event_types["commit_spike"], 5);
}

#[test]
fn test_full_run_groups_and_tests() {
    let f = fixture();
    let out = run_event_study(&EventStudyConfig::default(), &f.history, &event_list(&f.days)).unwrap();
    let r = &out.result;

    let types: Vec<&str> = r.by_event_type.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(types, vec!["commit_spike", "release"]);
    let tickers: Vec<&str> = r.by_ticker.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(tickers, vec!["ACME", "INIT"]);

    assert!(r.tests.get("t_test").unwrap().valid);
    assert!(r.tests.get("anova").unwrap().valid);
    assert_eq!(r.tests.get("t_test").unwrap().outcome.as_ref().unwrap().n, 10);

    // every event carries a jump of roughly 3% on day 0
    let mean = r.summary.overall_statistics.mean_ar_day_0.unwrap();
    assert!(mean > 0.02 && mean < 0.04, "mean ar_day_0 = {}", mean);
    assert_eq!(r.summary.overall_statistics.pct_positive_ar, Some(100.0));

    let weighted = &r.weighted_car_tests[&StandardWindow::CarM5To5];
    assert_eq!(weighted.test, "CAR-test (weighted)");
    assert_eq!(weighted.outcome.as_ref().unwrap().n, 10);

    let summary_names: Vec<&str> = r.test_summary.iter().map(|s| s.test.as_str()).collect();
    assert!(summary_names.contains(&"t_test"));
    assert!(r
        .summary
        .statistical_significance
        .iter()
        .all(|s| s.significant == (s.p_value < 0.05)));
}

#[test]
fn test_full_run_serializes_summary_fields() {
    let f = fixture();
    let out = run_event_study(&EventStudyConfig::default(), &f.history, &event_list(&f.days)).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert!(json.pointer("/result/summary/overall_statistics/mean_CAR_-5_5").is_some());
    assert!(json.pointer("/result/tests/t_test/p_value").is_some());
    assert_eq!(json.pointer("/result/batch/items/0/status").unwrap(), "analyzed");
}

#[test]
fn test_max_events_samples_filtered_list() {
    let f = fixture();
    let mut config = EventStudyConfig::default();
    config.analysis.max_events = Some(4);
    let events = event_list(&f.days);

    let a = run_event_study(&config, &f.history, &events).unwrap();
    let b = run_event_study(&config, &f.history, &events).unwrap();
    assert_eq!(a.result.filtered_events, 15);
    assert_eq!(a.result.batch.items.len(), 4);
    assert_eq!(a.result.summary.total_events, 4);
    assert_eq!(a.result.batch, b.result.batch);
}

#[test]
fn test_filters_relaxed_keeps_everything() {
    let f = fixture();
    let mut config = EventStudyConfig::default();
    config.analysis.min_events_per_company = 1;
    config.analysis.min_days_between = 0;
    let out = run_event_study(&config, &f.history, &event_list(&f.days)).unwrap();
    assert_eq!(out.result.filtered_events, 18);
    assert_eq!(out.result.summary.total_companies, 4);
}

#[test]
fn test_everything_filtered_is_not_an_error() {
    let f = fixture();
    let mut config = EventStudyConfig::default();
    config.analysis.min_events_per_company = 50;
    let out = run_event_study(&config, &f.history, &event_list(&f.days)).unwrap();
    assert_eq!(out.result.filtered_events, 0);
    assert!(out.result.tests.is_empty());
    assert!(out.result.by_event_type.is_empty());
    assert!(out.warnings.iter().any(|w| w.starts_with("No events left after filtering")));
}

#[test]
fn test_invalid_config_rejected() {
    let f = fixture();
    let mut config = EventStudyConfig::default();
    config.significance_levels = [0.05, 0.01, 0.10];
    assert!(run_event_study(&config, &f.history, &event_list(&f.days)).is_err());

    let mut config = EventStudyConfig::default();
    config.expected_return_model = "three_factor".into();
    assert!(run_event_study(&config, &f.history, &event_list(&f.days)).is_err());
}

#[test]
fn test_sample_events_is_reproducible_subset() {
    let f = fixture();
    let events = event_list(&f.days);
    let picked = sample_events(&events, Some(6), 7);
    assert_eq!(picked.len(), 6);
    assert_eq!(picked, sample_events(&events, Some(6), 7));
    assert!(picked.iter().all(|p| events.contains(p)));
}
