//! Per-habit streaks
//!
//! Builds a single habit's completion series from its due dates and logged
//! records, then reads streaks off the shared [`StreakAggregator`] primitive.
//!
//! The display rules keep a streak steady while "today" is still open: until
//! the user logs today (or when today's log falls short of the goal) the panel
//! shows the streak as of the habit's previous due date instead of zero.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::aggregate::RecordIndex;
use crate::calendar::DateRange;
use crate::config::DEFAULT_LOOKBACK_DAYS;
use crate::error::EngineError;
use crate::normalizer::ProgressNormalizer;
use crate::recurrence::RecurrenceResolver;
use crate::streak::{Cutoff, StreakAggregator};
use crate::types::{Habit, HabitSummary, ProgressRecord, StreakResult};

/// Streak service for a single habit
#[derive(Debug, Clone, Copy)]
pub struct HabitStreakService {
    lookback_days: u32,
}

impl Default for HabitStreakService {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK_DAYS)
    }
}

impl HabitStreakService {
    /// Create a service that considers at most `lookback_days` of history
    pub fn new(lookback_days: u32) -> Self {
        Self {
            lookback_days: lookback_days.max(1),
        }
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    /// Streak to show for `habit` on `today`.
    ///
    /// An incomplete today is carved out. When that still yields zero and
    /// nothing has been logged for today, the streak as of the previous due
    /// date is shown instead.
    pub fn display_streak(
        &self,
        habit: &Habit,
        history: &[ProgressRecord],
        today: NaiveDate,
    ) -> u32 {
        let records = index_for(habit, history);
        let series = self.series(habit, &records, today);

        let authoritative = StreakAggregator::compute(&series, Cutoff::Today(today)).current;
        if authoritative > 0 || records.get(&habit.id, today).is_some() {
            return authoritative;
        }

        let anchor = self.continuity_date(habit, today);
        let held = StreakAggregator::current_as_of(&series, anchor);
        debug!(habit = %habit.id, %today, %anchor, held, "holding streak until today is logged");
        held
    }

    /// Streak to show right after logging `new_raw_value` for `today`.
    ///
    /// A reached goal returns the fresh streak including today; otherwise the
    /// streak as of the previous due date is held.
    pub fn after_update(
        &self,
        habit: &Habit,
        history: &[ProgressRecord],
        today: NaiveDate,
        new_raw_value: f64,
    ) -> Result<u32, EngineError> {
        let update = ProgressRecord::new(habit.id.clone(), today, new_raw_value)?;
        let percentage = ProgressNormalizer::normalize_for(habit, update.raw_value);

        let mut records = index_for(habit, history);
        records.insert(update);
        let series = self.series(habit, &records, today);

        let streak = if ProgressNormalizer::is_goal_reached(habit, percentage) {
            StreakAggregator::current_as_of(&series, today)
        } else {
            StreakAggregator::current_as_of(&series, self.continuity_date(habit, today))
        };
        debug!(habit = %habit.id, %today, percentage, streak, "streak after update");
        Ok(streak)
    }

    /// Current and longest streak of `habit`, with the incomplete-today carve-out
    pub fn streaks(
        &self,
        habit: &Habit,
        history: &[ProgressRecord],
        today: NaiveDate,
    ) -> StreakResult {
        let records = index_for(habit, history);
        let series = self.series(habit, &records, today);
        StreakAggregator::compute(&series, Cutoff::Today(today))
    }

    /// Completion statistics of `habit` over `range`, with streaks as of `today`
    pub fn summary(
        &self,
        habit: &Habit,
        history: &[ProgressRecord],
        range: DateRange,
        today: NaiveDate,
    ) -> HabitSummary {
        let records = index_for(habit, history);

        let due = RecurrenceResolver::due_dates(habit, range);
        let completed = due
            .iter()
            .filter(|date| {
                records
                    .get(&habit.id, **date)
                    .map(|record| ProgressNormalizer::normalize_record(habit, record).percentage)
                    .is_some_and(ProgressNormalizer::is_complete)
            })
            .count() as u32;
        let due_days = due.len() as u32;
        let completion_rate = (due_days > 0).then(|| {
            ((u64::from(completed) * 200 + u64::from(due_days)) / (2 * u64::from(due_days))) as u8
        });

        let series = self.series(habit, &records, today);
        HabitSummary {
            habit_id: habit.id.clone(),
            start: range.start(),
            end: range.end(),
            due_days,
            completed_days: completed,
            completion_rate,
            streak: StreakAggregator::compute(&series, Cutoff::Today(today)),
        }
    }

    /// History window ending at `today`
    pub fn window(&self, today: NaiveDate) -> DateRange {
        DateRange::ending_at(today, self.lookback_days)
    }

    /// Completion series of `habit` within the lookback window.
    ///
    /// Every due date is an entry (0% when unlogged). Off-schedule logs are
    /// entries only when complete, so they can extend a streak but never
    /// break one.
    fn series(
        &self,
        habit: &Habit,
        records: &RecordIndex,
        today: NaiveDate,
    ) -> BTreeMap<NaiveDate, u8> {
        let window = self.window(today);
        let mut series: BTreeMap<NaiveDate, u8> = RecurrenceResolver::due_dates(habit, window)
            .into_iter()
            .map(|date| (date, 0))
            .collect();

        for record in records.for_habit(&habit.id) {
            if !window.contains(record.date) {
                continue;
            }
            let percentage = ProgressNormalizer::normalize_record(habit, record).percentage;
            if let Some(entry) = series.get_mut(&record.date) {
                *entry = percentage;
            } else if ProgressNormalizer::is_complete(percentage) {
                series.insert(record.date, percentage);
            }
        }
        series
    }

    /// Date whose streak is held while today is still open
    fn continuity_date(&self, habit: &Habit, today: NaiveDate) -> NaiveDate {
        match RecurrenceResolver::last_due_date_before(habit, today) {
            Some(date) => date,
            None => {
                warn!(
                    habit = %habit.id,
                    %today,
                    "no previous due date, falling back to yesterday"
                );
                today - Duration::days(1)
            }
        }
    }
}

fn index_for(habit: &Habit, history: &[ProgressRecord]) -> RecordIndex {
    RecordIndex::from_records(
        history
            .iter()
            .filter(|record| record.habit_id == habit.id)
            .cloned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayOfWeek, HabitId, HabitKind, Schedule};
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reading() -> Habit {
        Habit::new(
            HabitId::new("u1", "read"),
            HabitKind::Build,
            Schedule::daily(),
            day(2023, 8, 1),
        )
        .with_goal(10.0, "pages")
        .unwrap()
    }

    fn log(habit: &Habit, date: NaiveDate, raw: f64) -> ProgressRecord {
        ProgressRecord::new(habit.id.clone(), date, raw).unwrap()
    }

    fn three_good_days(habit: &Habit) -> Vec<ProgressRecord> {
        vec![
            log(habit, day(2023, 8, 12), 10.0),
            log(habit, day(2023, 8, 13), 12.0),
            log(habit, day(2023, 8, 14), 10.0),
        ]
    }

    #[test]
    fn test_display_holds_streak_before_today_is_logged() {
        let habit = reading();
        let history = three_good_days(&habit);
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 15)), 3);
    }

    #[test]
    fn test_display_counts_completed_today() {
        let habit = reading();
        let mut history = three_good_days(&habit);
        history.push(log(&habit, day(2023, 8, 15), 10.0));
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 15)), 4);
    }

    #[test]
    fn test_display_holds_streak_after_partial_log_today() {
        let habit = reading();
        let mut history = three_good_days(&habit);
        history.push(log(&habit, day(2023, 8, 15), 4.0));
        let service = HabitStreakService::default();

        let shown = service.display_streak(&habit, &history, day(2023, 8, 15));
        assert_eq!(shown, 3);
        let updated = service.after_update(&habit, &history, day(2023, 8, 15), 4.0).unwrap();
        assert_eq!(shown, updated);
    }

    #[test]
    fn test_display_is_zero_after_missed_day() {
        let habit = reading();
        let history = vec![
            log(&habit, day(2023, 8, 12), 10.0),
            log(&habit, day(2023, 8, 13), 10.0),
        ];
        let service = HabitStreakService::default();

        // 14th was due and never logged
        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 15)), 0);
    }

    #[test]
    fn test_after_update_goal_reached() {
        let habit = reading();
        let history = three_good_days(&habit);
        let service = HabitStreakService::default();

        let streak = service.after_update(&habit, &history, day(2023, 8, 15), 11.0).unwrap();
        assert_eq!(streak, 4);
    }

    #[test]
    fn test_after_update_partial_holds_previous_streak() {
        let habit = reading();
        let history = three_good_days(&habit);
        let service = HabitStreakService::default();

        let streak = service.after_update(&habit, &history, day(2023, 8, 15), 9.9).unwrap();
        assert_eq!(streak, 3);
    }

    #[test]
    fn test_after_update_replaces_todays_record() {
        let habit = reading();
        let mut history = three_good_days(&habit);
        history.push(log(&habit, day(2023, 8, 15), 2.0));
        let service = HabitStreakService::default();

        let streak = service.after_update(&habit, &history, day(2023, 8, 15), 10.0).unwrap();
        assert_eq!(streak, 4);
    }

    #[test]
    fn test_after_update_rejects_negative_value() {
        let habit = reading();
        let service = HabitStreakService::default();

        let err = service.after_update(&habit, &[], day(2023, 8, 15), -1.0).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_weekly_habit_skips_off_days() {
        let habit = Habit::new(
            HabitId::new("u1", "gym"),
            HabitKind::Build,
            Schedule::weekly([DayOfWeek::Monday, DayOfWeek::Thursday]),
            day(2023, 8, 1),
        );
        // Thu 3rd, Mon 7th, Thu 10th done; today is Mon 14th, not yet logged
        let history = vec![
            log(&habit, day(2023, 8, 3), 1.0),
            log(&habit, day(2023, 8, 7), 1.0),
            log(&habit, day(2023, 8, 10), 1.0),
        ];
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 14)), 3);
        assert_eq!(service.after_update(&habit, &history, day(2023, 8, 14), 1.0).unwrap(), 4);
    }

    #[test]
    fn test_off_schedule_log_extends_but_never_breaks() {
        let habit = Habit::new(
            HabitId::new("u1", "gym"),
            HabitKind::Build,
            Schedule::weekly([DayOfWeek::Monday]),
            day(2023, 8, 1),
        );
        let history = vec![
            log(&habit, day(2023, 8, 7), 1.0),
            // Wednesday, off schedule, nothing done
            log(&habit, day(2023, 8, 9), 0.0),
            // Saturday, off schedule, done
            log(&habit, day(2023, 8, 12), 1.0),
        ];
        let service = HabitStreakService::default();

        let result = service.streaks(&habit, &history, day(2023, 8, 13));
        assert_eq!(result, StreakResult { current: 2, longest: 2 });
    }

    #[test]
    fn test_empty_weekly_schedule_counts_complete_logs() {
        let habit = Habit::new(
            HabitId::new("u1", "paused"),
            HabitKind::Quit,
            Schedule::Weekly {
                days: Default::default(),
            },
            day(2023, 8, 1),
        );
        let history = vec![log(&habit, day(2023, 8, 14), 1.0)];
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 15)), 1);
    }

    fn paused_reading() -> Habit {
        Habit::new(
            HabitId::new("u1", "paused-read"),
            HabitKind::Build,
            Schedule::Weekly {
                days: Default::default(),
            },
            day(2023, 8, 1),
        )
        .with_goal(10.0, "pages")
        .unwrap()
    }

    #[test]
    fn test_empty_weekly_schedule_partial_update_holds_yesterday() {
        let habit = paused_reading();
        assert_eq!(RecurrenceResolver::last_due_date_before(&habit, day(2023, 8, 15)), None);
        let history = vec![
            log(&habit, day(2023, 8, 10), 10.0),
            log(&habit, day(2023, 8, 13), 10.0),
            log(&habit, day(2023, 8, 14), 10.0),
        ];
        let service = HabitStreakService::default();

        let held = service.after_update(&habit, &history, day(2023, 8, 15), 4.0).unwrap();
        assert_eq!(held, 3);
        let reached = service.after_update(&habit, &history, day(2023, 8, 15), 10.0).unwrap();
        assert_eq!(reached, 4);
    }

    #[test]
    fn test_empty_weekly_schedule_without_history_shows_zero() {
        let habit = paused_reading();
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &[], day(2023, 8, 15)), 0);
        assert_eq!(service.after_update(&habit, &[], day(2023, 8, 15), 0.0).unwrap(), 0);
    }

    fn every_three_days() -> Habit {
        Habit::new(
            HabitId::new("u1", "long-run"),
            HabitKind::Build,
            Schedule::Interval { days: 3 },
            day(2023, 8, 1),
        )
        .with_goal(5.0, "km")
        .unwrap()
    }

    #[test]
    fn test_interval_habit_off_day_holds_one_interval_back() {
        // Due 1, 4, 7, 10, 13, 16; the 15th is not due and one interval back is the 12th
        let habit = every_three_days();
        assert!(!RecurrenceResolver::is_due(&habit, day(2023, 8, 15)));
        assert_eq!(
            RecurrenceResolver::last_due_date_before(&habit, day(2023, 8, 15)),
            Some(day(2023, 8, 12))
        );
        let history = vec![
            log(&habit, day(2023, 8, 7), 5.0),
            log(&habit, day(2023, 8, 10), 5.0),
            log(&habit, day(2023, 8, 13), 5.0),
        ];
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 15)), 3);
        let held = service.after_update(&habit, &history, day(2023, 8, 15), 2.0).unwrap();
        assert_eq!(held, 2);
        let reached = service.after_update(&habit, &history, day(2023, 8, 15), 5.0).unwrap();
        assert_eq!(reached, 4);
    }

    #[test]
    fn test_interval_habit_off_day_display_uses_held_value() {
        // 13th was due and missed, so the carve-out walk yields zero
        let habit = every_three_days();
        let history = vec![
            log(&habit, day(2023, 8, 7), 5.0),
            log(&habit, day(2023, 8, 10), 5.0),
        ];
        let service = HabitStreakService::default();

        assert_eq!(service.streaks(&habit, &history, day(2023, 8, 15)).current, 0);
        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 15)), 2);
    }

    #[test]
    fn test_interval_habit_holds_streak_from_previous_interval() {
        let habit = Habit::new(
            HabitId::new("u1", "long-run"),
            HabitKind::Build,
            Schedule::Interval { days: 3 },
            day(2023, 8, 1),
        );
        let history = vec![
            log(&habit, day(2023, 8, 7), 1.0),
            log(&habit, day(2023, 8, 10), 1.0),
        ];
        let service = HabitStreakService::default();

        assert_eq!(service.display_streak(&habit, &history, day(2023, 8, 13)), 2);
    }

    #[test]
    fn test_lookback_bounds_history() {
        let habit = reading();
        let history = three_good_days(&habit);
        let service = HabitStreakService::new(2);

        assert_eq!(service.streaks(&habit, &history, day(2023, 8, 14)).current, 2);
    }

    #[test]
    fn test_summary() {
        let habit = reading();
        let mut history = three_good_days(&habit);
        history.push(log(&habit, day(2023, 8, 11), 5.0));
        let service = HabitStreakService::default();
        let range = DateRange::new(day(2023, 8, 11), day(2023, 8, 14)).unwrap();

        let summary = service.summary(&habit, &history, range, day(2023, 8, 14));
        assert_eq!(summary.due_days, 4);
        assert_eq!(summary.completed_days, 3);
        assert_eq!(summary.completion_rate, Some(75));
        assert_eq!(summary.streak, StreakResult { current: 3, longest: 3 });
    }
}
