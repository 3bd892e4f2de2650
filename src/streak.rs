//! Streak computation
//!
//! One primitive serves both the whole-user calendar view and the per-habit
//! panel: a walk over `(date, percentage)` entries from the most recent date
//! backwards, counting runs of 100%.
//!
//! An incomplete "today" is dropped before the walk so it can neither break an
//! ongoing streak nor count toward a historical run. Evaluating the series as
//! of an earlier date (the per-habit continuity rule) does not apply that
//! carve-out: the as-of date counts only when it is complete.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::types::{DailyScore, StreakResult, COMPLETE};

/// How the most recent date of the series is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// Dates up to `today`; an incomplete `today` is skipped entirely
    Today(NaiveDate),
    /// Dates up to and including the given date, no carve-out
    AsOf(NaiveDate),
}

impl Cutoff {
    fn date(&self) -> NaiveDate {
        match self {
            Cutoff::Today(date) | Cutoff::AsOf(date) => *date,
        }
    }
}

/// Aggregator for current and longest streaks
pub struct StreakAggregator;

impl StreakAggregator {
    /// Streaks over the counted daily scores of a user, as seen on `today`.
    ///
    /// Scores are placed by their map key.
    pub fn compute_streaks(
        scores: &BTreeMap<NaiveDate, DailyScore>,
        today: NaiveDate,
    ) -> StreakResult {
        let series: BTreeMap<NaiveDate, u8> = scores
            .iter()
            .filter(|(_, score)| score.is_counted())
            .map(|(date, score)| (*date, score.percentage))
            .collect();
        Self::compute(&series, Cutoff::Today(today))
    }

    /// Streaks over a `(date, percentage)` series
    pub fn compute(series: &BTreeMap<NaiveDate, u8>, cutoff: Cutoff) -> StreakResult {
        let last = cutoff.date();
        let exclude_last = match cutoff {
            Cutoff::Today(today) => series.get(&today).is_some_and(|pct| *pct != COMPLETE),
            Cutoff::AsOf(_) => false,
        };

        let mut streak_active = true;
        let mut current = 0u32;
        let mut run = 0u32;
        let mut longest = 0u32;

        for (date, pct) in series.range(..=last).rev() {
            if exclude_last && *date == last {
                continue;
            }
            if *pct == COMPLETE {
                if streak_active {
                    current += 1;
                }
                run += 1;
            } else {
                streak_active = false;
                longest = longest.max(run);
                run = 0;
            }
        }
        longest = longest.max(run);

        StreakResult { current, longest }
    }

    /// Current streak only, as of `date`
    pub fn current_as_of(series: &BTreeMap<NaiveDate, u8>, date: NaiveDate) -> u32 {
        Self::compute(series, Cutoff::AsOf(date)).current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DailyAggregator;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scores(entries: &[(NaiveDate, u8)]) -> BTreeMap<NaiveDate, DailyScore> {
        entries
            .iter()
            .map(|(date, pct)| (*date, DailyAggregator::aggregate(*date, &[*pct])))
            .collect()
    }

    #[test]
    fn test_incomplete_today_is_carved_out() {
        let input = scores(&[
            (day(2023, 8, 13), 100),
            (day(2023, 8, 14), 100),
            (day(2023, 8, 15), 40),
        ]);
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 15));
        assert_eq!(result, StreakResult { current: 2, longest: 2 });
    }

    #[test]
    fn test_break_resets_run() {
        let input = scores(&[
            (day(2023, 8, 11), 100),
            (day(2023, 8, 12), 0),
            (day(2023, 8, 13), 100),
            (day(2023, 8, 14), 100),
        ]);
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 14));
        assert_eq!(result, StreakResult { current: 2, longest: 2 });
    }

    #[test]
    fn test_longest_run_in_history() {
        let input = scores(&[
            (day(2023, 8, 1), 100),
            (day(2023, 8, 2), 100),
            (day(2023, 8, 3), 100),
            (day(2023, 8, 4), 99),
            (day(2023, 8, 5), 100),
        ]);
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 5));
        assert_eq!(result, StreakResult { current: 1, longest: 3 });
    }

    #[test]
    fn test_incomplete_yesterday_breaks_current() {
        let input = scores(&[(day(2023, 8, 13), 100), (day(2023, 8, 14), 50)]);
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 15));
        assert_eq!(result, StreakResult { current: 0, longest: 1 });
    }

    #[test]
    fn test_future_dates_are_ignored() {
        let input = scores(&[(day(2023, 8, 14), 100), (day(2023, 8, 16), 0)]);
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 15));
        assert_eq!(result, StreakResult { current: 1, longest: 1 });
    }

    #[test]
    fn test_uncounted_dates_do_not_break_streaks() {
        let mut input = scores(&[(day(2023, 8, 12), 100), (day(2023, 8, 14), 100)]);
        input.insert(day(2023, 8, 13), DailyAggregator::aggregate(day(2023, 8, 13), &[]));
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 14));
        assert_eq!(result, StreakResult { current: 2, longest: 2 });
    }

    #[test]
    fn test_scores_are_placed_by_key() {
        let mut input = scores(&[(day(2023, 8, 13), 100), (day(2023, 8, 14), 100)]);
        // Score computed for another date, stored under the 15th
        input.insert(day(2023, 8, 15), DailyAggregator::aggregate(day(2023, 8, 1), &[100]));
        let result = StreakAggregator::compute_streaks(&input, day(2023, 8, 15));
        assert_eq!(result, StreakResult { current: 3, longest: 3 });
    }

    #[test]
    fn test_empty_history() {
        let result = StreakAggregator::compute_streaks(&BTreeMap::new(), day(2023, 8, 15));
        assert_eq!(result, StreakResult::default());
    }

    #[test]
    fn test_as_of_counts_incomplete_last_date() {
        let series: BTreeMap<NaiveDate, u8> =
            [(day(2023, 8, 13), 100), (day(2023, 8, 14), 100), (day(2023, 8, 15), 40)]
                .into_iter()
                .collect();
        assert_eq!(StreakAggregator::current_as_of(&series, day(2023, 8, 15)), 0);
        assert_eq!(StreakAggregator::current_as_of(&series, day(2023, 8, 14)), 2);
    }

    fn history() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(prop_oneof![Just(100u8), 0u8..100], 0..40)
    }

    proptest! {
        #[test]
        fn prop_longest_is_at_least_current(pcts in history()) {
            let start = day(2023, 1, 1);
            let series: BTreeMap<NaiveDate, u8> = pcts
                .iter()
                .enumerate()
                .map(|(i, pct)| (start + Duration::days(i as i64), *pct))
                .collect();
            let today = start + Duration::days(pcts.len() as i64);
            let result = StreakAggregator::compute(&series, Cutoff::Today(today));
            prop_assert!(result.longest >= result.current);
        }

        #[test]
        fn prop_incomplete_today_equals_omission(pcts in history(), today_pct in 0u8..100) {
            let start = day(2023, 1, 1);
            let mut series: BTreeMap<NaiveDate, u8> = pcts
                .iter()
                .enumerate()
                .map(|(i, pct)| (start + Duration::days(i as i64), *pct))
                .collect();
            let today = start + Duration::days(pcts.len() as i64);

            let without_today = StreakAggregator::compute(&series, Cutoff::Today(today));
            series.insert(today, today_pct);
            let with_today = StreakAggregator::compute(&series, Cutoff::Today(today));
            prop_assert_eq!(with_today, without_today);
        }
    }
}
