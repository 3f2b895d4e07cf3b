//! Record normalization
//!
//! Converts raw mood records into one fixed-width feature vector per logged day.
//! Days without a record are skipped, never interpolated, and a missing weather
//! covariate stays absent instead of being zero-filled.

use crate::config::ScaleConfig;
use crate::error::InsightError;
use crate::source::{DateRange, WeatherSource};
use crate::types::{FeatureVector, MoodRecord};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Why a record was refused by the normalizer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordIssue {
    #[error("{field} {value} is outside the {min}-{max} scale")]
    OrdinalOutOfRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("sleep_hours {0} must be between 0 and the configured maximum")]
    InvalidSleep(f64),

    #[error("weather_temp is not a finite number")]
    InvalidWeather,
}

/// Check a record against the data model ranges
pub fn validate_record(record: &MoodRecord, scale: &ScaleConfig) -> Result<(), RecordIssue> {
    for (field, value) in [
        ("mood_score", record.mood_score),
        ("energy_level", record.energy_level),
        ("anxiety_level", record.anxiety_level),
    ] {
        if !scale.contains(value) {
            return Err(RecordIssue::OrdinalOutOfRange {
                field,
                value,
                min: scale.ordinal_min,
                max: scale.ordinal_max,
            });
        }
    }

    if !record.sleep_hours.is_finite()
        || record.sleep_hours < 0.0
        || record.sleep_hours > scale.max_sleep_hours
    {
        return Err(RecordIssue::InvalidSleep(record.sleep_hours));
    }

    if matches!(record.weather_temp, Some(t) if !t.is_finite()) {
        return Err(RecordIssue::InvalidWeather);
    }

    Ok(())
}

/// Running sums for one calendar day
#[derive(Default)]
struct DayAccumulator {
    entries: u32,
    mood: f64,
    energy: f64,
    anxiety: f64,
    sleep: f64,
    activity: f64,
    social: f64,
    weather_sum: f64,
    weather_count: u32,
    weather_condition: Option<String>,
}

impl DayAccumulator {
    fn add(&mut self, record: &MoodRecord) {
        self.entries += 1;
        self.mood += record.mood_score as f64;
        self.energy += record.energy_level as f64;
        self.anxiety += record.anxiety_level as f64;
        self.sleep += record.sleep_hours;
        self.activity += record.activity_minutes as f64;
        self.social += record.social_interactions as f64;
        if let Some(t) = record.weather_temp {
            self.weather_sum += t;
            self.weather_count += 1;
        }
        if record.weather_condition.is_some() {
            self.weather_condition = record.weather_condition.clone();
        }
    }

    fn finish(self, date: NaiveDate, weather: Option<&dyn WeatherSource>) -> FeatureVector {
        let n = self.entries as f64;
        let weather_temp = if self.weather_count > 0 {
            Some(self.weather_sum / self.weather_count as f64)
        } else {
            weather
                .and_then(|w| w.temperature(date))
                .filter(|t| t.is_finite())
        };

        FeatureVector {
            date,
            mood: self.mood / n,
            energy: self.energy / n,
            anxiety: self.anxiety / n,
            sleep_hours: self.sleep / n,
            activity_minutes: self.activity / n,
            social_interactions: self.social / n,
            day_of_week: date.weekday().num_days_from_monday() as u8,
            weather_temp,
            weather_condition: self.weather_condition,
            entries: self.entries,
        }
    }
}

/// Normalizer for mood records
pub struct RecordNormalizer<'a> {
    scale: &'a ScaleConfig,
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(scale: &'a ScaleConfig) -> Self {
        Self { scale }
    }

    /// Build one feature vector per logged day, oldest first.
    ///
    /// Records outside `range` (when given) or failing validation are dropped.
    /// Fails with [`InsightError::InsufficientData`] when no day survives.
    pub fn normalize(
        &self,
        records: &[MoodRecord],
        range: Option<&DateRange>,
        weather: Option<&dyn WeatherSource>,
    ) -> Result<Vec<FeatureVector>, InsightError> {
        let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
        let mut rejected = 0usize;

        for record in records {
            let date = record.day();
            if range.is_some_and(|r| !r.contains(date)) {
                continue;
            }
            if let Err(issue) = validate_record(record, self.scale) {
                warn!(timestamp = %record.timestamp, %issue, "skipping invalid mood record");
                rejected += 1;
                continue;
            }
            days.entry(date).or_default().add(record);
        }

        let vectors: Vec<FeatureVector> = days
            .into_iter()
            .map(|(date, acc)| acc.finish(date, weather))
            .collect();

        debug!(
            records = records.len(),
            rejected,
            days = vectors.len(),
            "normalized mood records"
        );

        if vectors.is_empty() {
            return Err(InsightError::InsufficientData(
                "no logged days in the analysis window".to_string(),
            ));
        }
        Ok(vectors)
    }
}
