use clap::Args;
use serde_json::Value;

use event_study_core::quality::{validate_data_quality, DEFAULT_MIN_TRADING_DAYS};

use crate::input;

/// Arguments for the price-data quality check
#[derive(Args)]
pub struct QualityArgs {
    /// Stock price CSV
    #[arg(long)]
    pub prices: String,

    /// Market index price CSV over the same span
    #[arg(long)]
    pub market: String,

    #[arg(long, default_value_t = DEFAULT_MIN_TRADING_DAYS)]
    pub min_trading_days: usize,
}

pub fn run_quality(args: QualityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let stock = input::prices::load_price_csv(&args.prices)?;
    let market = input::prices::load_price_csv(&args.market)?;
    let span = match (stock.first_date(), stock.last_date()) {
        (Some(start), Some(end)) => market.between(start, end),
        _ => market,
    };
    let report = validate_data_quality(&stock, &span, args.min_trading_days);
    Ok(serde_json::to_value(report)?)
}
