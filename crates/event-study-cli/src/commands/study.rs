use clap::Args;
use serde_json::{json, Value};
use std::collections::BTreeSet;

use event_study_core::event_study::batch::aggregate;
use event_study_core::event_study::{EventResult, EventStudy, GroupBy};
use event_study_core::pipeline::run_event_study;
use event_study_core::{parse_calendar_date, EventRecord, EventStudyConfig, EventType};

use crate::input;

/// Arguments for the full pipeline
#[derive(Args)]
pub struct AnalyzeArgs {
    /// JSON or YAML list of events ({ticker, date, event_type, metadata}); stdin if omitted
    #[arg(long)]
    pub events: Option<String>,

    /// Directory holding one `<TICKER>.csv` price file per ticker
    #[arg(long)]
    pub prices: String,

    /// Market index price CSV
    #[arg(long)]
    pub market: String,

    /// Analyse at most this many events (seeded sample)
    #[arg(long)]
    pub max_events: Option<usize>,
}

/// Arguments for a single event
#[derive(Args)]
pub struct EventArgs {
    #[arg(long)]
    pub ticker: String,

    /// Event date (YYYY-MM-DD or an RFC 3339 timestamp)
    #[arg(long)]
    pub date: String,

    /// release, commit_spike or any other label
    #[arg(long, default_value = "release")]
    pub event_type: String,

    /// Directory holding `<TICKER>.csv`
    #[arg(long)]
    pub prices: String,

    /// Market index price CSV
    #[arg(long)]
    pub market: String,

    /// Include the day-by-day abnormal-return table
    #[arg(long)]
    pub returns: bool,
}

/// Arguments for aggregation of saved results
#[derive(Args)]
pub struct AggregateArgs {
    /// JSON array of per-event results; stdin if omitted
    #[arg(long)]
    pub input: Option<String>,

    /// event_type or ticker
    #[arg(long, default_value = "event_type")]
    pub group_by: String,
}

pub fn run_analyze(
    args: AnalyzeArgs,
    config: &EventStudyConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let events: Vec<EventRecord> = input::read_input(args.events.as_deref(), "event study analysis")?;
    let tickers: BTreeSet<&str> = events.iter().map(|e| e.ticker.as_str()).collect();
    let history = input::prices::load_history(&args.prices, &args.market, tickers)?;

    let mut config = config.clone();
    if args.max_events.is_some() {
        config.analysis.max_events = args.max_events;
    }

    let output = run_event_study(&config, &history, &events)?;
    Ok(serde_json::to_value(output)?)
}

pub fn run_event(
    args: EventArgs,
    config: &EventStudyConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let date = parse_calendar_date(&args.date)?;
    let history =
        input::prices::load_history(&args.prices, &args.market, [args.ticker.as_str()])?;
    let study = EventStudy::new(config, &history)?;

    let event = EventRecord::new(&args.ticker, date, EventType::from(args.event_type.as_str()));
    let result = study.analyze_event(&event)?;
    if !args.returns {
        return Ok(serde_json::to_value(result)?);
    }

    let window = study.abnormal_returns(&args.ticker, date)?;
    Ok(json!({
        "result": result,
        "abnormal_returns": window.rows(),
    }))
}

pub fn run_aggregate(args: AggregateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let group_by: GroupBy = args.group_by.parse()?;
    let results: Vec<EventResult> = input::read_input(args.input.as_deref(), "aggregation")?;
    let rows = aggregate(&results, group_by);
    Ok(json!({
        "group_by": group_by.as_str(),
        "rows": rows,
    }))
}
