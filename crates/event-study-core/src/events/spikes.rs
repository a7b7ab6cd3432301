use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::SpikeConfig;
use crate::descriptive;
use crate::error::EventStudyError;
use crate::types::{EventRecord, EventType};
use crate::EventStudyResult;

/// Commit count of one repository on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCommitCount {
    pub date: NaiveDate,
    pub repo: String,
    pub num_commits: u64,
}

/// Flag days whose commit count sits more than `spike_threshold` rolling
/// standard deviations above the rolling mean.
///
/// Statistics are taken per repository over the trailing `spike_window`
/// observations, the current day included, and need at least
/// `spike_min_periods` of them. A zero rolling deviation never flags a day.
/// Spikes come back in date order as `commit_spike` events for `ticker`
/// with `repo`, `num_commits` and `z_score` metadata.
pub fn detect_commit_spikes(
    ticker: &str,
    daily_counts: &[DailyCommitCount],
    config: &SpikeConfig,
) -> EventStudyResult<Vec<EventRecord>> {
    if config.spike_min_periods < 2 || config.spike_window < config.spike_min_periods {
        return Err(EventStudyError::InvalidInput {
            field: "events.spike_window".into(),
            reason: format!(
                "window {} must be at least min_periods {} (>= 2)",
                config.spike_window, config.spike_min_periods
            ),
        });
    }

    let mut by_repo: BTreeMap<&str, Vec<&DailyCommitCount>> = BTreeMap::new();
    for c in daily_counts {
        by_repo.entry(c.repo.as_str()).or_default().push(c);
    }

    let mut spikes: Vec<(NaiveDate, EventRecord)> = Vec::new();
    for (repo, mut days) in by_repo {
        days.sort_by_key(|c| c.date);
        let counts: Vec<f64> = days.iter().map(|c| c.num_commits as f64).collect();

        for (i, day) in days.iter().enumerate() {
            let Some(z) = rolling_z_score(&counts, i, config.spike_window, config.spike_min_periods)
            else {
                continue;
            };
            if z > config.spike_threshold {
                debug!("Commit spike in {} on {}: z = {:.2}", repo, day.date, z);
                let event = EventRecord::new(ticker, day.date, EventType::CommitSpike)
                    .with_metadata("repo", repo)
                    .with_metadata("num_commits", day.num_commits)
                    .with_metadata("z_score", z);
                spikes.push((day.date, event));
            }
        }
    }

    spikes.sort_by_key(|(d, _)| *d);
    info!(
        "Detected {} commit spikes for {} across {} daily counts",
        spikes.len(),
        ticker,
        daily_counts.len()
    );
    Ok(spikes.into_iter().map(|(_, e)| e).collect())
}

/// z-score of `counts[i]` against the trailing window ending at `i`.
fn rolling_z_score(counts: &[f64], i: usize, window: usize, min_periods: usize) -> Option<f64> {
    let start = (i + 1).saturating_sub(window);
    let trailing = &counts[start..=i];
    if trailing.len() < min_periods {
        return None;
    }
    let mean = descriptive::mean(trailing)?;
    let std = descriptive::std_dev(trailing)?;
    if std == 0.0 {
        return None;
    }
    let z = (counts[i] - mean) / std;
    z.is_finite().then_some(z)
}
