//! Core types for the Habit Pulse engine
//!
//! This module defines the data that flows through each stage of the engine:
//! habits and their raw progress records coming from the store, and the derived
//! percentages, daily scores and streaks handed back to callers.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::EngineError;

/// Percentage that marks a habit as complete for a date
pub const COMPLETE: u8 = 100;

/// Habit identifier, unique per owner
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HabitId {
    pub owner_id: String,
    pub name: String,
}

impl HabitId {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.name)
    }
}

/// Whether the habit is something to do or something to avoid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitKind {
    Build,
    Quit,
}

/// Day of the week used by weekly schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    #[serde(alias = "mon")]
    Monday,
    #[serde(alias = "tue")]
    Tuesday,
    #[serde(alias = "wed")]
    Wednesday,
    #[serde(alias = "thu")]
    Thursday,
    #[serde(alias = "fri")]
    Friday,
    #[serde(alias = "sat")]
    Saturday,
    #[serde(alias = "sun")]
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// Recurrence rule of a habit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Due every `days` days counted from the habit's start date.
    /// Zero is treated as daily.
    Interval { days: u32 },
    /// Due on the selected days of the week
    Weekly { days: BTreeSet<DayOfWeek> },
}

impl Schedule {
    pub fn daily() -> Self {
        Schedule::Interval { days: 1 }
    }

    pub fn weekly(days: impl IntoIterator<Item = DayOfWeek>) -> Self {
        Schedule::Weekly {
            days: days.into_iter().collect(),
        }
    }
}

/// Numeric target of a build habit (e.g. 10 pages)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GoalRecord")]
pub struct Goal {
    value: f64,
    unit: String,
}

#[derive(Deserialize)]
struct GoalRecord {
    value: f64,
    #[serde(default)]
    unit: String,
}

impl TryFrom<GoalRecord> for Goal {
    type Error = EngineError;

    fn try_from(record: GoalRecord) -> Result<Self, Self::Error> {
        Goal::new(record.value, record.unit)
    }
}

impl Goal {
    /// Create a goal; the value must be finite and strictly positive
    pub fn new(value: f64, unit: impl Into<String>) -> Result<Self, EngineError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(EngineError::InvalidGoal(value));
        }
        Ok(Self {
            value,
            unit: unit.into(),
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// How a raw value turns into a completion percentage.
///
/// Fixed when the habit is constructed: only build habits with a goal are
/// proportional, everything else is a done/not-done flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "goal", rename_all = "snake_case")]
pub enum ProgressKind {
    Proportional(Goal),
    Binary,
}

/// A tracked behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HabitRecord", into = "HabitRecord")]
pub struct Habit {
    pub id: HabitId,
    pub kind: HabitKind,
    pub schedule: Schedule,
    pub progress: ProgressKind,
    /// First day the habit exists; anchors interval schedules
    pub start_date: NaiveDate,
}

impl Habit {
    /// Create a habit with binary progress
    pub fn new(
        id: HabitId,
        kind: HabitKind,
        schedule: Schedule,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            kind,
            schedule,
            progress: ProgressKind::Binary,
            start_date,
        }
    }

    /// Attach a numeric goal. Ignored for quit habits, which are always binary.
    pub fn with_goal(mut self, value: f64, unit: impl Into<String>) -> Result<Self, EngineError> {
        let goal = Goal::new(value, unit)?;
        if self.kind == HabitKind::Build {
            self.progress = ProgressKind::Proportional(goal);
        }
        Ok(self)
    }

    pub fn goal(&self) -> Option<&Goal> {
        match &self.progress {
            ProgressKind::Proportional(goal) => Some(goal),
            ProgressKind::Binary => None,
        }
    }
}

/// Flat wire form of a habit, with a nullable goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitRecord {
    pub owner_id: String,
    pub name: String,
    pub kind: HabitKind,
    pub schedule: Schedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<GoalSpec>,
    pub start_date: NaiveDate,
}

/// Wire form of a goal inside a [`HabitRecord`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalSpec {
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

impl TryFrom<HabitRecord> for Habit {
    type Error = EngineError;

    fn try_from(record: HabitRecord) -> Result<Self, Self::Error> {
        let habit = Habit::new(
            HabitId::new(record.owner_id, record.name),
            record.kind,
            record.schedule,
            record.start_date,
        );
        match record.goal {
            Some(goal) => habit.with_goal(goal.value, goal.unit),
            None => Ok(habit),
        }
    }
}

impl From<Habit> for HabitRecord {
    fn from(habit: Habit) -> Self {
        let goal = habit.goal().map(|goal| GoalSpec {
            value: goal.value(),
            unit: goal.unit().to_string(),
        });
        HabitRecord {
            owner_id: habit.id.owner_id,
            name: habit.id.name,
            kind: habit.kind,
            schedule: habit.schedule,
            goal,
            start_date: habit.start_date,
        }
    }
}

/// One logged observation for a habit on a calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(flatten)]
    pub habit_id: HabitId,
    pub date: NaiveDate,
    pub raw_value: f64,
}

impl ProgressRecord {
    /// Create a record; the raw value must be finite and non-negative
    pub fn new(habit_id: HabitId, date: NaiveDate, raw_value: f64) -> Result<Self, EngineError> {
        let record = Self {
            habit_id,
            date,
            raw_value,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.raw_value.is_finite() || self.raw_value < 0.0 {
            return Err(EngineError::InvalidRawValue {
                habit: self.habit_id.to_string(),
                value: self.raw_value,
            });
        }
        Ok(())
    }
}

/// Normalized completion of one habit on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPercentage {
    pub habit_id: HabitId,
    pub date: NaiveDate,
    /// Completion (0-100)
    pub percentage: u8,
}

/// Aggregate completion across all participating habits on one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScore {
    pub date: NaiveDate,
    /// Rounded mean completion (0-100); 0 when no habit participated
    pub percentage: u8,
    /// Number of habits due or logged on the date
    pub habit_count: usize,
}

impl DailyScore {
    /// Whether the date takes part in multi-date averages and streaks
    pub fn is_counted(&self) -> bool {
        self.habit_count > 0
    }
}

/// Current and longest run of complete days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    pub current: u32,
    pub longest: u32,
}

/// Per-habit statistics over a date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub habit_id: HabitId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Due dates in the range
    pub due_days: u32,
    /// Due dates logged at 100%
    pub completed_days: u32,
    /// Rounded share of due dates completed; absent when nothing was due
    pub completion_rate: Option<u8>,
    pub streak: StreakResult,
}
