//! Daily and period aggregation
//!
//! This module folds per-habit percentages into one score per date and averages
//! daily scores over a period. Dates on which no habit was due or logged carry
//! `habit_count == 0` and never enter a multi-date average.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::calendar::DateRange;
use crate::normalizer::ProgressNormalizer;
use crate::recurrence::RecurrenceResolver;
use crate::types::{DailyPercentage, DailyScore, Habit, HabitId, ProgressRecord};

/// Aggregator for daily completion scores
pub struct DailyAggregator;

impl DailyAggregator {
    /// Combine the percentages of all participating habits on `date`
    pub fn aggregate(date: NaiveDate, percentages: &[u8]) -> DailyScore {
        DailyScore {
            date,
            percentage: Self::rounded_mean(percentages.iter().map(|p| u32::from(*p)))
                .unwrap_or(0),
            habit_count: percentages.len(),
        }
    }

    /// Average completion over the counted dates of a period.
    ///
    /// Returns `None` when no date in `scores` had a participating habit.
    pub fn period_average<'a>(scores: impl IntoIterator<Item = &'a DailyScore>) -> Option<u8> {
        Self::rounded_mean(
            scores
                .into_iter()
                .filter(|score| score.is_counted())
                .map(|score| u32::from(score.percentage)),
        )
    }

    /// Percentages of every habit that participates on `date`.
    ///
    /// A habit participates when it is due on the date or has a record for it;
    /// a due habit without a record contributes 0%.
    pub fn daily_percentages(
        habits: &[Habit],
        records: &RecordIndex,
        date: NaiveDate,
    ) -> Vec<DailyPercentage> {
        habits
            .iter()
            .filter_map(|habit| match records.get(&habit.id, date) {
                Some(record) => Some(ProgressNormalizer::normalize_record(habit, record)),
                None if RecurrenceResolver::is_due(habit, date) => Some(DailyPercentage {
                    habit_id: habit.id.clone(),
                    date,
                    percentage: 0,
                }),
                None => None,
            })
            .collect()
    }

    /// Daily score for `date` across `habits`
    pub fn score_for_date(habits: &[Habit], records: &RecordIndex, date: NaiveDate) -> DailyScore {
        let percentages: Vec<u8> = Self::daily_percentages(habits, records, date)
            .into_iter()
            .map(|daily| daily.percentage)
            .collect();
        Self::aggregate(date, &percentages)
    }

    /// Scores for every day of `range`, keyed by date
    pub fn scores_for_range(
        habits: &[Habit],
        records: &RecordIndex,
        range: DateRange,
    ) -> BTreeMap<NaiveDate, DailyScore> {
        range
            .days()
            .map(|date| (date, Self::score_for_date(habits, records, date)))
            .collect()
    }

    /// Round-half-up mean of non-negative integers
    fn rounded_mean(values: impl Iterator<Item = u32>) -> Option<u8> {
        let (sum, count) = values.fold((0u64, 0u64), |(sum, count), value| {
            (sum + u64::from(value), count + 1)
        });
        if count == 0 {
            return None;
        }
        // (2 * sum + count) / (2 * count) == floor(sum / count + 0.5)
        let mean = (2 * sum + count) / (2 * count);
        Some(mean.min(100) as u8)
    }
}

/// Progress records indexed by habit and date
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    by_habit: HashMap<HabitId, BTreeMap<NaiveDate, ProgressRecord>>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index records; a later record for the same habit and date replaces an
    /// earlier one.
    pub fn from_records(records: impl IntoIterator<Item = ProgressRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    pub fn insert(&mut self, record: ProgressRecord) -> Option<ProgressRecord> {
        self.by_habit
            .entry(record.habit_id.clone())
            .or_default()
            .insert(record.date, record)
    }

    pub fn get(&self, habit_id: &HabitId, date: NaiveDate) -> Option<&ProgressRecord> {
        self.by_habit.get(habit_id).and_then(|dates| dates.get(&date))
    }

    /// Records of one habit in date order
    pub fn for_habit<'a>(&'a self, habit_id: &HabitId) -> impl Iterator<Item = &'a ProgressRecord> {
        self.by_habit
            .get(habit_id)
            .into_iter()
            .flat_map(|dates| dates.values())
    }

    pub fn len(&self) -> usize {
        self.by_habit.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
