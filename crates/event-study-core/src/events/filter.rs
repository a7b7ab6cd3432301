use std::collections::HashMap;
use tracing::info;

use crate::types::EventRecord;

/// Drop thinly covered tickers and events crowded too close together.
///
/// Tickers with fewer than `min_events_per_ticker` events are removed. When
/// `min_days_between` is positive the remaining events are ordered by
/// (ticker, date) and an event is dropped if its calendar gap to the
/// previous event of the same ticker is below `min_days_between`; the gap is
/// measured against the previous input event, dropped or not. The first
/// event of every ticker is kept.
pub fn filter_events(
    events: &[EventRecord],
    min_events_per_ticker: usize,
    min_days_between: i64,
) -> Vec<EventRecord> {
    let mut per_ticker: HashMap<&str, usize> = HashMap::new();
    for e in events {
        *per_ticker.entry(e.ticker.as_str()).or_default() += 1;
    }
    let kept_tickers = per_ticker
        .values()
        .filter(|n| **n >= min_events_per_ticker)
        .count();
    info!(
        "Found {} tickers with at least {} events",
        kept_tickers, min_events_per_ticker
    );

    let mut filtered: Vec<EventRecord> = events
        .iter()
        .filter(|e| per_ticker[e.ticker.as_str()] >= min_events_per_ticker)
        .cloned()
        .collect();

    if min_days_between > 0 {
        filtered.sort_by(|a, b| {
            a.ticker
                .cmp(&b.ticker)
                .then_with(|| a.event_date.cmp(&b.event_date))
        });
        let gaps: Vec<Option<i64>> = filtered
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let prev = i.checked_sub(1).map(|j| &filtered[j])?;
                (prev.ticker == e.ticker).then(|| (e.event_date - prev.event_date).num_days())
            })
            .collect();
        filtered = filtered
            .into_iter()
            .zip(gaps)
            .filter(|(_, gap)| gap.map_or(true, |g| g >= min_days_between))
            .map(|(e, _)| e)
            .collect();
    }

    info!("After validation: {} of {} events", filtered.len(), events.len());
    filtered
}
