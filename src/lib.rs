//! Habit Pulse - recurrence, progress and streak engine for habit tracking
//!
//! Pulse turns habits and their logged progress into the numbers a habit
//! tracker shows: which habits are due on a day, how complete a day was, the
//! average over a period, and current and longest streaks. The engine is
//! deterministic and works on calendar days only:
//! recurrence → normalization → daily aggregation → streaks.
//!
//! ## Modules
//!
//! - **Engine**: [`HabitEngine`] queries over any [`HabitStore`]
//! - **Snapshot API**: one-shot JSON queries used by the CLI and C ABI

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod habit_streak;
pub mod normalizer;
pub mod recurrence;
pub mod store;
pub mod streak;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregate::{DailyAggregator, RecordIndex};
pub use calendar::{format_day, parse_day, DateRange};
pub use config::EngineConfig;
pub use engine::{
    snapshot_daily_score, snapshot_habit_streak, snapshot_habit_streak_after_update,
    snapshot_period_average, snapshot_user_streaks, HabitEngine, HabitStreak, PeriodAverage,
};
pub use error::EngineError;
pub use habit_streak::HabitStreakService;
pub use normalizer::ProgressNormalizer;
pub use recurrence::RecurrenceResolver;
pub use streak::StreakAggregator;
pub use types::{
    DailyPercentage, DailyScore, DayOfWeek, Goal, Habit, HabitId, HabitKind, HabitSummary,
    ProgressKind, ProgressRecord, Schedule, StreakResult,
};

// Snapshot exports
pub use store::{HabitStore, InMemoryStore, Snapshot, SCHEMA_VERSION};

/// Engine version reported by the CLI and C ABI
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "habit-pulse";
