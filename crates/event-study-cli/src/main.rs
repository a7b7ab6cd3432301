mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use event_study_core::EventStudyConfig;

use commands::events::SpikesArgs;
use commands::quality::QualityArgs;
use commands::significance::TestsArgs;
use commands::study::{AggregateArgs, AnalyzeArgs, EventArgs};

/// Event-study analysis of stock price reactions to software events
#[derive(Parser)]
#[command(
    name = "evstudy",
    version,
    about = "Event-study analysis of stock price reactions to software events",
    long_about = "Measures abnormal stock returns around dated software events \
                  (releases, commit spikes) with market-model expected returns, \
                  cumulative abnormal return windows and a battery of \
                  parametric and non-parametric significance tests."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// YAML configuration file; defaults apply to every missing key
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: filter, analyse, aggregate and test
    Analyze(AnalyzeArgs),
    /// Analyse a single event
    Event(EventArgs),
    /// Run the significance test battery over saved event results
    Tests(TestsArgs),
    /// Aggregate saved event results by event type or ticker
    Aggregate(AggregateArgs),
    /// Detect commit-activity spikes from daily commit counts
    Spikes(SpikesArgs),
    /// Check a ticker's price history against the market calendar
    Quality(QualityArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

impl Cli {
    fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("{}: failed to install logger: {}", "warning".yellow().bold(), e);
        }
    }

    fn load_config(&self) -> Result<EventStudyConfig, Box<dyn std::error::Error>> {
        match &self.config {
            Some(path) => Ok(EventStudyConfig::load(path)?),
            None => Ok(EventStudyConfig::default()),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    let config = match cli.load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::study::run_analyze(args, &config),
        Commands::Event(args) => commands::study::run_event(args, &config),
        Commands::Tests(args) => commands::significance::run_tests(args, &config),
        Commands::Aggregate(args) => commands::study::run_aggregate(args),
        Commands::Spikes(args) => commands::events::run_spikes(args, &config),
        Commands::Quality(args) => commands::quality::run_quality(args),
        Commands::Version => {
            println!("evstudy {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
