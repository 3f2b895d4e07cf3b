//! Injected data accessors
//!
//! The engine never owns storage. Callers hand it a [`RecordSource`] that
//! returns a user's records for a date range, and optionally a
//! [`WeatherSource`] that fills in the temperature covariate for days whose
//! records don't carry one.

use crate::error::InsightError;
use crate::types::MoodRecord;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-chosen span of days to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisWindow {
    /// The last `n` days up to and including the reference date
    LastDays(u32),
    /// An explicit inclusive range
    Range { start: NaiveDate, end: NaiveDate },
}

impl AnalysisWindow {
    /// Resolve to a concrete inclusive date range
    pub fn resolve(&self, as_of: NaiveDate) -> Result<DateRange, InsightError> {
        match *self {
            AnalysisWindow::LastDays(0) => Err(InsightError::InsufficientData(
                "analysis window covers zero days".to_string(),
            )),
            AnalysisWindow::LastDays(days) => as_of
                .checked_sub_signed(Duration::days(days as i64 - 1))
                .map(|start| DateRange { start, end: as_of })
                .ok_or_else(|| {
                    InsightError::InsufficientData(format!(
                        "analysis window of {days} days reaches past the supported date range"
                    ))
                }),
            AnalysisWindow::Range { start, end } if start <= end => Ok(DateRange { start, end }),
            AnalysisWindow::Range { start, end } => Err(InsightError::InsufficientData(format!(
                "analysis window starts ({start}) after it ends ({end})"
            ))),
        }
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Storage collaborator: returns a user's records for a date range, oldest first
pub trait RecordSource {
    fn records(&self, user_id: &str, range: &DateRange) -> Result<Vec<MoodRecord>, InsightError>;
}

/// Weather collaborator: temperature (Celsius) for a date, if known
pub trait WeatherSource {
    fn temperature(&self, date: NaiveDate) -> Option<f64>;
}

impl<F> WeatherSource for F
where
    F: Fn(NaiveDate) -> Option<f64>,
{
    fn temperature(&self, date: NaiveDate) -> Option<f64> {
        self(date)
    }
}

/// Record source backed by a map of user id to records
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    records: HashMap<String, Vec<MoodRecord>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records for a user, keeping that user's history in timestamp order
    pub fn insert(&mut self, user_id: impl Into<String>, records: Vec<MoodRecord>) {
        let entry = self.records.entry(user_id.into()).or_default();
        entry.extend(records);
        entry.sort_by_key(|r| r.timestamp);
    }

    pub fn user_count(&self) -> usize {
        self.records.len()
    }
}

impl RecordSource for InMemoryRecordSource {
    fn records(&self, user_id: &str, range: &DateRange) -> Result<Vec<MoodRecord>, InsightError> {
        Ok(self
            .records
            .get(user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| range.contains(r.day()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Weather lookup backed by a per-day map
#[derive(Debug, Clone, Default)]
pub struct InMemoryWeatherSource {
    temperatures: HashMap<NaiveDate, f64>,
}

impl InMemoryWeatherSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, temperature: f64) {
        self.temperatures.insert(date, temperature);
    }
}

impl WeatherSource for InMemoryWeatherSource {
    fn temperature(&self, date: NaiveDate) -> Option<f64> {
        self.temperatures.get(&date).copied()
    }
}
