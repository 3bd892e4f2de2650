//! Progress normalization
//!
//! This module converts raw logged values into completion percentages.
//! - Proportional habits scale the raw value against their goal, capped at 100
//! - Binary habits (quit habits, build habits without a goal) are 100 or 0
//! - Exactly 100 is complete; there is no other threshold

use crate::types::{DailyPercentage, Habit, HabitKind, ProgressKind, ProgressRecord, COMPLETE};

/// Normalizer for converting raw progress to percentages
pub struct ProgressNormalizer;

impl ProgressNormalizer {
    /// Normalize a raw value for the given progress kind (0-100).
    ///
    /// Negative or non-finite raw values count as nothing logged.
    pub fn normalize(progress: &ProgressKind, raw_value: f64) -> u8 {
        let raw = if raw_value.is_finite() { raw_value.max(0.0) } else { 0.0 };
        match progress {
            ProgressKind::Proportional(goal) => {
                let pct = (raw / goal.value() * 100.0).round();
                pct.min(f64::from(COMPLETE)) as u8
            }
            ProgressKind::Binary => {
                if raw > 0.0 {
                    COMPLETE
                } else {
                    0
                }
            }
        }
    }

    /// Normalize a raw value logged for `habit`
    pub fn normalize_for(habit: &Habit, raw_value: f64) -> u8 {
        Self::normalize(&habit.progress, raw_value)
    }

    /// Normalize a stored record of `habit`
    pub fn normalize_record(habit: &Habit, record: &ProgressRecord) -> DailyPercentage {
        DailyPercentage {
            habit_id: record.habit_id.clone(),
            date: record.date,
            percentage: Self::normalize_for(habit, record.raw_value),
        }
    }

    /// Whether a percentage counts as complete
    pub fn is_complete(percentage: u8) -> bool {
        percentage == COMPLETE
    }

    /// Whether a freshly logged percentage reaches the habit's goal
    pub fn is_goal_reached(habit: &Habit, percentage: u8) -> bool {
        match (&habit.kind, &habit.progress) {
            (HabitKind::Build, ProgressKind::Proportional(_)) => percentage >= COMPLETE,
            _ => percentage == COMPLETE,
        }
    }
}
