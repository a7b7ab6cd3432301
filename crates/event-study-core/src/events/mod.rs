//! Building and pruning the event list fed to the engine.

pub mod filter;
pub mod spikes;

pub use filter::filter_events;
pub use spikes::{detect_commit_spikes, DailyCommitCount};
