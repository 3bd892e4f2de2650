//! Recurrence resolution
//!
//! Decides whether a habit is due on a calendar date and locates the nearest
//! due date before a given day. Pure calendar arithmetic on `NaiveDate`:
//! month and year boundaries are handled by chrono, and there are no instants
//! or time zones involved.

use chrono::{Datelike, Duration, NaiveDate};

use crate::calendar::DateRange;
use crate::error::EngineError;
use crate::types::{DayOfWeek, Habit, Schedule};

/// Resolver for habit schedules
pub struct RecurrenceResolver;

impl RecurrenceResolver {
    /// Whether `habit` is due on `date`.
    ///
    /// Nothing is due before the habit's start date.
    pub fn is_due(habit: &Habit, date: NaiveDate) -> bool {
        if date < habit.start_date {
            return false;
        }
        match &habit.schedule {
            Schedule::Interval { days } => {
                let elapsed = (date - habit.start_date).num_days();
                elapsed.rem_euclid(interval_step(*days)) == 0
            }
            Schedule::Weekly { days } => days.contains(&DayOfWeek::from(date.weekday())),
        }
    }

    /// Nearest due date strictly before `date`.
    ///
    /// Interval schedules step back one interval; weekly schedules scan the
    /// previous seven days. Returns `None` for a weekly schedule with no days.
    pub fn last_due_date_before(habit: &Habit, date: NaiveDate) -> Option<NaiveDate> {
        match &habit.schedule {
            Schedule::Interval { days } => {
                date.checked_sub_signed(Duration::days(interval_step(*days)))
            }
            Schedule::Weekly { days } => (1..=7)
                .filter_map(|back| date.checked_sub_signed(Duration::days(back)))
                .find(|candidate| days.contains(&DayOfWeek::from(candidate.weekday()))),
        }
    }

    /// Like [`RecurrenceResolver::last_due_date_before`], but an empty weekly
    /// schedule is reported as a contract violation.
    pub fn require_last_due_date_before(
        habit: &Habit,
        date: NaiveDate,
    ) -> Result<NaiveDate, EngineError> {
        Self::last_due_date_before(habit, date)
            .ok_or_else(|| EngineError::EmptyWeeklySchedule(habit.id.to_string()))
    }

    /// All due dates of `habit` within `range`, in ascending order
    pub fn due_dates(habit: &Habit, range: DateRange) -> Vec<NaiveDate> {
        let Some(range) = range.clamp_start(habit.start_date) else {
            return Vec::new();
        };
        range.days().filter(|day| Self::is_due(habit, *day)).collect()
    }
}

fn interval_step(days: u32) -> i64 {
    i64::from(days.max(1))
}
