use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which way to roll a non-trading date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignDirection {
    /// Next session on or after the date.
    Forward,
    /// Previous session on or before the date.
    Backward,
}

/// Map a calendar date onto a trading day.
///
/// `trading_days` must be sorted ascending without duplicates. A date that is
/// itself a trading day is returned unchanged; otherwise the nearest trading
/// day strictly after (`Forward`) or strictly before (`Backward`) it, or
/// `None` when the index runs out in that direction.
pub fn align(
    event_date: NaiveDate,
    trading_days: &[NaiveDate],
    direction: AlignDirection,
) -> Option<NaiveDate> {
    match trading_days.binary_search(&event_date) {
        Ok(_) => Some(event_date),
        Err(insert_at) => match direction {
            AlignDirection::Forward => trading_days.get(insert_at).copied(),
            AlignDirection::Backward => insert_at
                .checked_sub(1)
                .and_then(|i| trading_days.get(i))
                .copied(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // Thu 4, Fri 5, Mon 8, Tue 9 January 2024
    fn week() -> Vec<NaiveDate> {
        vec![d(2024, 1, 4), d(2024, 1, 5), d(2024, 1, 8), d(2024, 1, 9)]
    }

    #[test]
    fn test_trading_day_is_returned_unchanged() {
        assert_eq!(align(d(2024, 1, 5), &week(), AlignDirection::Forward), Some(d(2024, 1, 5)));
        assert_eq!(align(d(2024, 1, 5), &week(), AlignDirection::Backward), Some(d(2024, 1, 5)));
    }

    #[test]
    fn test_weekend_rolls_forward_to_monday() {
        // Saturday is one calendar day from Friday; forward still picks Monday.
        assert_eq!(align(d(2024, 1, 6), &week(), AlignDirection::Forward), Some(d(2024, 1, 8)));
        assert_eq!(align(d(2024, 1, 7), &week(), AlignDirection::Forward), Some(d(2024, 1, 8)));
    }

    #[test]
    fn test_weekend_rolls_backward_to_friday() {
        assert_eq!(align(d(2024, 1, 7), &week(), AlignDirection::Backward), Some(d(2024, 1, 5)));
    }

    #[test]
    fn test_out_of_range_is_not_found() {
        assert_eq!(align(d(2024, 1, 10), &week(), AlignDirection::Forward), None);
        assert_eq!(align(d(2024, 1, 3), &week(), AlignDirection::Backward), None);
        assert_eq!(align(d(2024, 1, 3), &[], AlignDirection::Forward), None);
    }

    #[test]
    fn test_before_range_forward_picks_first_day() {
        assert_eq!(align(d(2023, 12, 30), &week(), AlignDirection::Forward), Some(d(2024, 1, 4)));
    }
}
