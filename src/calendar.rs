//! Calendar-day helpers
//!
//! Dates are exchanged as `YYYY-MM-DD` strings and handled as `NaiveDate`.
//! Nothing in the engine interprets a date as an instant.

use chrono::{Duration, NaiveDate};

use crate::error::EngineError;

/// Wire format for calendar days
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar day
pub fn parse_day(input: &str) -> Result<NaiveDate, EngineError> {
    let trimmed = input.trim();
    // chrono accepts non-padded fields; the wire format does not
    if trimmed.len() != 10 {
        return Err(EngineError::InvalidDate(input.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DAY_FORMAT)
        .map_err(|_| EngineError::InvalidDate(input.to_string()))
}

/// Format a calendar day as `YYYY-MM-DD`
pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::InvalidDateRange {
                start: format_day(start),
                end: format_day(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Range of `days` days ending at `end` (inclusive)
    pub fn ending_at(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - Duration::days(span),
            end,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Clamp the start of the range so it does not precede `floor`.
    /// Returns `None` when the whole range lies before `floor`.
    pub fn clamp_start(&self, floor: NaiveDate) -> Option<Self> {
        if floor > self.end {
            return None;
        }
        Some(Self {
            start: self.start.max(floor),
            end: self.end,
        })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}
