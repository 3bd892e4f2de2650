//! Engine orchestration
//!
//! This module provides the public query API of Habit Pulse. [`HabitEngine`]
//! reads from a [`HabitStore`] and runs the stages in order:
//!
//! 1. RecurrenceResolver - which habits are due on which dates
//! 2. ProgressNormalizer - raw values to percentages
//! 3. DailyAggregator - percentages to daily scores and period averages
//! 4. StreakAggregator / HabitStreakService - streaks over the score series
//!
//! The `snapshot_*` functions run a single query against a snapshot document
//! and return JSON; the C ABI and the CLI are built on them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::aggregate::{DailyAggregator, RecordIndex};
use crate::calendar::{parse_day, DateRange};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::habit_streak::HabitStreakService;
use crate::recurrence::RecurrenceResolver;
use crate::store::{HabitStore, InMemoryStore};
use crate::streak::StreakAggregator;
use crate::types::{DailyScore, Habit, HabitId, HabitSummary, ProgressRecord, StreakResult};

/// Habit query engine over a store
pub struct HabitEngine<S: HabitStore> {
    store: S,
    config: EngineConfig,
    streaks: HabitStreakService,
}

impl<S: HabitStore> HabitEngine<S> {
    /// Create an engine with default settings
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            streaks: HabitStreakService::new(config.lookback_days),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Completion score of all of the owner's habits on `date`
    #[instrument(skip(self))]
    pub fn daily_score(&self, owner_id: &str, date: NaiveDate) -> Result<DailyScore, EngineError> {
        let range = DateRange::ending_at(date, 1);
        let (habits, records) = self.load(owner_id, range)?;
        let score = DailyAggregator::score_for_date(&habits, &records, date);
        debug!(percentage = score.percentage, habit_count = score.habit_count, "daily score");
        Ok(score)
    }

    /// Daily scores for every date in `start..=end`
    #[instrument(skip(self))]
    pub fn period_scores(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyScore>, EngineError> {
        let range = self.period_range(start, end)?;
        let (habits, records) = self.load(owner_id, range)?;
        Ok(DailyAggregator::scores_for_range(&habits, &records, range)
            .into_values()
            .collect())
    }

    /// Average completion over the dates in `start..=end` that had any
    /// participating habit, or `None` when there were none
    #[instrument(skip(self))]
    pub fn period_average(
        &self,
        owner_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<u8>, EngineError> {
        let scores = self.period_scores(owner_id, start, end)?;
        let average = DailyAggregator::period_average(&scores);
        debug!(?average, "period average");
        Ok(average)
    }

    /// Current and longest streak across all of the owner's habits
    #[instrument(skip(self))]
    pub fn user_streaks(
        &self,
        owner_id: &str,
        today: NaiveDate,
    ) -> Result<StreakResult, EngineError> {
        let range = self.streaks.window(today);
        let (habits, records) = self.load(owner_id, range)?;
        let scores = DailyAggregator::scores_for_range(&habits, &records, range);
        let result = StreakAggregator::compute_streaks(&scores, today);
        debug!(current = result.current, longest = result.longest, "user streaks");
        Ok(result)
    }

    /// Streak shown on the habit panel
    #[instrument(skip(self), fields(habit = %habit_id))]
    pub fn habit_streak(&self, habit_id: &HabitId, today: NaiveDate) -> Result<u32, EngineError> {
        let habit = self.habit(habit_id)?;
        let history = self.history(habit_id, self.streaks.window(today))?;
        Ok(self.streaks.display_streak(&habit, &history, today))
    }

    /// Streak shown right after logging `new_raw_value` for today.
    ///
    /// The value is not stored; the caller persists it.
    #[instrument(skip(self), fields(habit = %habit_id))]
    pub fn habit_streak_after_update(
        &self,
        habit_id: &HabitId,
        today: NaiveDate,
        new_raw_value: f64,
    ) -> Result<u32, EngineError> {
        let habit = self.habit(habit_id)?;
        let history = self.history(habit_id, self.streaks.window(today))?;
        self.streaks.after_update(&habit, &history, today, new_raw_value)
    }

    /// Habits of the owner that are due on `date`
    #[instrument(skip(self))]
    pub fn due_habits(&self, owner_id: &str, date: NaiveDate) -> Result<Vec<Habit>, EngineError> {
        Ok(self
            .store
            .fetch_habits(owner_id)?
            .into_iter()
            .filter(|habit| RecurrenceResolver::is_due(habit, date))
            .collect())
    }

    /// Completion statistics of one habit over `start..=end`
    #[instrument(skip(self), fields(habit = %habit_id))]
    pub fn habit_summary(
        &self,
        habit_id: &HabitId,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    ) -> Result<HabitSummary, EngineError> {
        let range = self.period_range(start, end)?;
        let window = self.streaks.window(today);
        let span = DateRange::new(range.start().min(window.start()), range.end().max(today))?;

        let habit = self.habit(habit_id)?;
        let history = self.history(habit_id, span)?;
        Ok(self.streaks.summary(&habit, &history, range, today))
    }

    /// String-date form of [`HabitEngine::daily_score`]
    pub fn daily_score_str(&self, owner_id: &str, date: &str) -> Result<DailyScore, EngineError> {
        self.daily_score(owner_id, parse_day(date)?)
    }

    /// String-date form of [`HabitEngine::period_average`]
    pub fn period_average_str(
        &self,
        owner_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Option<u8>, EngineError> {
        self.period_average(owner_id, parse_day(start)?, parse_day(end)?)
    }

    /// String-date form of [`HabitEngine::user_streaks`]
    pub fn user_streaks_str(
        &self,
        owner_id: &str,
        today: &str,
    ) -> Result<StreakResult, EngineError> {
        self.user_streaks(owner_id, parse_day(today)?)
    }

    /// String-date form of [`HabitEngine::habit_streak`]
    pub fn habit_streak_str(&self, habit_id: &HabitId, today: &str) -> Result<u32, EngineError> {
        self.habit_streak(habit_id, parse_day(today)?)
    }

    /// String-date form of [`HabitEngine::habit_streak_after_update`]
    pub fn habit_streak_after_update_str(
        &self,
        habit_id: &HabitId,
        today: &str,
        new_raw_value: f64,
    ) -> Result<u32, EngineError> {
        self.habit_streak_after_update(habit_id, parse_day(today)?, new_raw_value)
    }

    fn period_range(&self, start: NaiveDate, end: NaiveDate) -> Result<DateRange, EngineError> {
        let range = DateRange::new(start, end)?;
        if range.len_days() > i64::from(self.config.max_period_days) {
            return Err(EngineError::DateRangeTooLong {
                days: range.len_days(),
                max: self.config.max_period_days,
            });
        }
        Ok(range)
    }

    fn habit(&self, habit_id: &HabitId) -> Result<Habit, EngineError> {
        self.store
            .fetch_habits(&habit_id.owner_id)?
            .into_iter()
            .find(|habit| habit.id == *habit_id)
            .ok_or_else(|| EngineError::HabitNotFound(habit_id.to_string()))
    }

    fn history(
        &self,
        habit_id: &HabitId,
        range: DateRange,
    ) -> Result<Vec<ProgressRecord>, EngineError> {
        self.store.fetch_progress(habit_id, range.start(), range.end())
    }

    fn load(
        &self,
        owner_id: &str,
        range: DateRange,
    ) -> Result<(Vec<Habit>, RecordIndex), EngineError> {
        let habits = self.store.fetch_habits(owner_id)?;
        let mut records = RecordIndex::new();
        for habit in &habits {
            for record in self.history(&habit.id, range)? {
                records.insert(record);
            }
        }
        Ok((habits, records))
    }
}

/// Period average of one owner, as returned by [`snapshot_period_average`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAverage {
    pub owner_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Absent when no date in the period had a participating habit
    pub average: Option<u8>,
}

/// Streak of one habit, as returned by the `snapshot_habit_streak*` functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitStreak {
    #[serde(flatten)]
    pub habit_id: HabitId,
    pub date: NaiveDate,
    pub streak: u32,
}

fn snapshot_engine(snapshot_json: &str) -> Result<HabitEngine<InMemoryStore>, EngineError> {
    Ok(HabitEngine::new(InMemoryStore::from_json(snapshot_json)?))
}

/// Daily score of `owner_id` on `date`, as JSON.
///
/// # Example
/// ```ignore
/// let score = snapshot_daily_score(&snapshot_json, "u1", "2023-08-15")?;
/// // {"date":"2023-08-15","percentage":73,"habit_count":2}
/// ```
pub fn snapshot_daily_score(
    snapshot_json: &str,
    owner_id: &str,
    date: &str,
) -> Result<String, EngineError> {
    let score = snapshot_engine(snapshot_json)?.daily_score_str(owner_id, date)?;
    Ok(serde_json::to_string(&score)?)
}

/// Period average of `owner_id` over `start..=end`, as JSON
pub fn snapshot_period_average(
    snapshot_json: &str,
    owner_id: &str,
    start: &str,
    end: &str,
) -> Result<String, EngineError> {
    let (start, end) = (parse_day(start)?, parse_day(end)?);
    let average = snapshot_engine(snapshot_json)?.period_average(owner_id, start, end)?;
    Ok(serde_json::to_string(&PeriodAverage {
        owner_id: owner_id.to_string(),
        start,
        end,
        average,
    })?)
}

/// Current and longest streak of `owner_id` as of `today`, as JSON
pub fn snapshot_user_streaks(
    snapshot_json: &str,
    owner_id: &str,
    today: &str,
) -> Result<String, EngineError> {
    let result = snapshot_engine(snapshot_json)?.user_streaks_str(owner_id, today)?;
    Ok(serde_json::to_string(&result)?)
}

/// Displayed streak of one habit as of `today`, as JSON
pub fn snapshot_habit_streak(
    snapshot_json: &str,
    owner_id: &str,
    habit_name: &str,
    today: &str,
) -> Result<String, EngineError> {
    let habit_id = HabitId::new(owner_id, habit_name);
    let date = parse_day(today)?;
    let streak = snapshot_engine(snapshot_json)?.habit_streak(&habit_id, date)?;
    Ok(serde_json::to_string(&HabitStreak {
        habit_id,
        date,
        streak,
    })?)
}

/// Displayed streak of one habit right after logging `new_raw_value` today, as JSON
pub fn snapshot_habit_streak_after_update(
    snapshot_json: &str,
    owner_id: &str,
    habit_name: &str,
    today: &str,
    new_raw_value: f64,
) -> Result<String, EngineError> {
    let habit_id = HabitId::new(owner_id, habit_name);
    let date = parse_day(today)?;
    let streak =
        snapshot_engine(snapshot_json)?.habit_streak_after_update(&habit_id, date, new_raw_value)?;
    Ok(serde_json::to_string(&HabitStreak {
        habit_id,
        date,
        streak,
    })?)
}
