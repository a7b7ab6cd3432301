use clap::Args;
use serde_json::{json, Value};

use event_study_core::events::{detect_commit_spikes, DailyCommitCount};
use event_study_core::EventStudyConfig;

use crate::input;

/// Arguments for commit-spike detection
#[derive(Args)]
pub struct SpikesArgs {
    /// JSON array of daily counts ({date, repo, num_commits}); stdin if omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Ticker the repositories belong to
    #[arg(long)]
    pub ticker: String,

    /// z-score above which a day is a spike (overrides the config)
    #[arg(long)]
    pub threshold: Option<f64>,
}

pub fn run_spikes(
    args: SpikesArgs,
    config: &EventStudyConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let counts: Vec<DailyCommitCount> = input::read_input(args.input.as_deref(), "spike detection")?;

    let mut spike_config = config.events.clone();
    if let Some(t) = args.threshold {
        spike_config.spike_threshold = t;
    }

    let events = detect_commit_spikes(&args.ticker, &counts, &spike_config)?;
    Ok(json!({
        "ticker": args.ticker,
        "num_spikes": events.len(),
        "results": events,
    }))
}
