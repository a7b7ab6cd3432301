use clap::Args;
use serde_json::{json, Value};

use event_study_core::event_study::{EventResult, MetricColumn};
use event_study_core::statistics::StatisticalTests;
use event_study_core::EventStudyConfig;

use crate::input;

/// Arguments for the significance test battery
#[derive(Args)]
pub struct TestsArgs {
    /// JSON array of per-event results; stdin if omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Result column to test (ar_day_0, mean_ar, median_ar, std_ar, CAR_0_1, ...)
    #[arg(long, default_value = "ar_day_0", allow_hyphen_values = true)]
    pub column: String,
}

pub fn run_tests(
    args: TestsArgs,
    config: &EventStudyConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let column: MetricColumn = args.column.parse()?;
    let results: Vec<EventResult> = input::read_input(args.input.as_deref(), "statistical tests")?;

    let tests = StatisticalTests::new(config);
    let battery = tests.perform_all_tests(&results, column);
    let summary = tests.summary_table(&battery);

    Ok(json!({
        "column": column,
        "valid_events": results.iter().filter(|r| r.is_valid()).count(),
        "tests": battery,
        "test_summary": summary,
    }))
}
