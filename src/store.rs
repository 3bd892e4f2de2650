//! Habit storage
//!
//! The engine reads habits and progress through the [`HabitStore`] trait and
//! never writes. [`InMemoryStore`] serves tests, the CLI and the C ABI from a
//! `habit.snapshot.v1` document:
//!
//! ```json
//! {
//!   "schema_version": "habit.snapshot.v1",
//!   "habits": [{"owner_id": "u1", "name": "read", "kind": "build",
//!               "schedule": {"type": "interval", "days": 1},
//!               "goal": {"value": 10, "unit": "pages"}, "start_date": "2023-08-01"}],
//!   "progress": [{"owner_id": "u1", "name": "read", "date": "2023-08-15", "raw_value": 7}]
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::aggregate::RecordIndex;
use crate::calendar::format_day;
use crate::error::EngineError;
use crate::types::{Habit, HabitId, ProgressRecord};

/// Current snapshot schema version
pub const SCHEMA_VERSION: &str = "habit.snapshot.v1";

/// Read access to habits and their progress
pub trait HabitStore {
    /// All habits owned by `owner_id`
    fn fetch_habits(&self, owner_id: &str) -> Result<Vec<Habit>, EngineError>;

    /// Progress of one habit for dates in `start..=end`, at most one record per date
    fn fetch_progress(
        &self,
        habit_id: &HabitId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProgressRecord>, EngineError>;
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Serialized habits and progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub progress: Vec<ProgressRecord>,
}

impl Snapshot {
    pub fn new(habits: Vec<Habit>, progress: Vec<ProgressRecord>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            habits,
            progress,
        }
    }

    /// Parse and validate a snapshot document
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Append progress records given as newline-delimited JSON
    pub fn extend_progress_ndjson(&mut self, ndjson: &str) -> Result<(), EngineError> {
        self.progress.extend(parse_progress_ndjson(ndjson)?);
        self.validate()
    }

    /// Check the schema version and the uniqueness and validity of every entry
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(EngineError::Snapshot(format!(
                "unsupported schema_version '{}', expected '{}'",
                self.schema_version, SCHEMA_VERSION
            )));
        }

        let mut habits = HashSet::new();
        for habit in &self.habits {
            if habit.id.owner_id.is_empty() || habit.id.name.is_empty() {
                return Err(EngineError::Snapshot(
                    "habit owner_id and name must not be empty".to_string(),
                ));
            }
            if !habits.insert(&habit.id) {
                return Err(EngineError::DuplicateHabit(habit.id.to_string()));
            }
        }

        let mut logged = HashSet::new();
        for record in &self.progress {
            record.validate()?;
            if !habits.contains(&record.habit_id) {
                return Err(EngineError::Snapshot(format!(
                    "progress on {} references unknown habit {}",
                    format_day(record.date),
                    record.habit_id
                )));
            }
            if !logged.insert((&record.habit_id, record.date)) {
                return Err(EngineError::DuplicateProgress {
                    habit: record.habit_id.to_string(),
                    date: format_day(record.date),
                });
            }
        }
        Ok(())
    }
}

/// Parse newline-delimited progress records, skipping blank lines
pub fn parse_progress_ndjson(ndjson: &str) -> Result<Vec<ProgressRecord>, EngineError> {
    ndjson
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<ProgressRecord>(line)
                .map_err(|e| EngineError::Snapshot(format!("progress line {}: {e}", index + 1)))
        })
        .collect()
}

/// Store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    habits: BTreeMap<HabitId, Habit>,
    records: RecordIndex,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a validated snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, EngineError> {
        snapshot.validate()?;
        Ok(Self {
            habits: snapshot
                .habits
                .into_iter()
                .map(|habit| (habit.id.clone(), habit))
                .collect(),
            records: RecordIndex::from_records(snapshot.progress),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Self::from_snapshot(Snapshot::from_json(json)?)
    }

    /// Add a habit; the id must be new
    pub fn insert_habit(&mut self, habit: Habit) -> Result<(), EngineError> {
        if self.habits.contains_key(&habit.id) {
            return Err(EngineError::DuplicateHabit(habit.id.to_string()));
        }
        self.habits.insert(habit.id.clone(), habit);
        Ok(())
    }

    /// Record progress, replacing any earlier record for the same date
    pub fn log_progress(&mut self, record: ProgressRecord) -> Result<(), EngineError> {
        record.validate()?;
        if !self.habits.contains_key(&record.habit_id) {
            return Err(EngineError::HabitNotFound(record.habit_id.to_string()));
        }
        self.records.insert(record);
        Ok(())
    }

    pub fn habit(&self, habit_id: &HabitId) -> Option<&Habit> {
        self.habits.get(habit_id)
    }

    /// Export the current contents
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.habits.values().cloned().collect(),
            self.habits
                .keys()
                .flat_map(|id| self.records.for_habit(id).cloned())
                .collect(),
        )
    }
}

impl HabitStore for InMemoryStore {
    fn fetch_habits(&self, owner_id: &str) -> Result<Vec<Habit>, EngineError> {
        Ok(self
            .habits
            .values()
            .filter(|habit| habit.id.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn fetch_progress(
        &self,
        habit_id: &HabitId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ProgressRecord>, EngineError> {
        Ok(self
            .records
            .for_habit(habit_id)
            .filter(|record| start <= record.date && record.date <= end)
            .cloned()
            .collect())
    }
}
