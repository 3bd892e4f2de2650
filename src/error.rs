//! Error types for Habit Pulse

use thiserror::Error;

/// Errors that can occur while resolving, normalizing or aggregating habit data
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid goal value {0}: goals must be finite and greater than zero")]
    InvalidGoal(f64),

    #[error("Invalid calendar date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid raw value {value} for habit {habit}: must be finite and non-negative")]
    InvalidRawValue { habit: String, value: f64 },

    #[error("Weekly schedule for habit {0} has no selected days")]
    EmptyWeeklySchedule(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Date range of {days} days exceeds the configured maximum of {max}")]
    DateRangeTooLong { days: i64, max: u32 },

    #[error("Duplicate progress record for habit {habit} on {date}")]
    DuplicateProgress { habit: String, date: String },

    #[error("Duplicate habit {0}")]
    DuplicateHabit(String),

    #[error("Habit not found: {0}")]
    HabitNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the error is a caller contract violation (fatal, never retried)
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidGoal(_)
                | EngineError::InvalidDate(_)
                | EngineError::InvalidRawValue { .. }
                | EngineError::EmptyWeeklySchedule(_)
                | EngineError::InvalidDateRange { .. }
                | EngineError::DateRangeTooLong { .. }
                | EngineError::DuplicateProgress { .. }
                | EngineError::DuplicateHabit(_)
        )
    }
}
