//! Core types for the insight engine
//!
//! This module defines the data structures that flow through each stage of the
//! engine: raw mood records, per-day feature vectors, per-stage results and the
//! insights handed back to the caller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One self-reported logging event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodRecord {
    /// When the entry was logged (UTC)
    pub timestamp: DateTime<Utc>,
    /// Overall mood (ordinal, 1-10 by default)
    pub mood_score: u8,
    /// Energy level (ordinal)
    pub energy_level: u8,
    /// Anxiety level (ordinal)
    pub anxiety_level: u8,
    /// Hours slept the night before
    pub sleep_hours: f64,
    /// Minutes of physical activity
    pub activity_minutes: u32,
    /// Number of social interactions
    pub social_interactions: u32,
    /// Outdoor temperature in Celsius, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_temp: Option<f64>,
    /// Free-form weather description (e.g. "rain")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_condition: Option<String>,
    /// Free-text note. Never read by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MoodRecord {
    /// Calendar day (UTC) the record belongs to
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A single column of the per-day feature schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Mood,
    Energy,
    Anxiety,
    Sleep,
    Activity,
    Social,
    DayOfWeek,
    WeatherTemp,
}

impl Feature {
    /// Behavioral and mood columns that feed the anomaly model
    pub const BEHAVIORAL: [Feature; 6] = [
        Feature::Mood,
        Feature::Energy,
        Feature::Anxiety,
        Feature::Sleep,
        Feature::Activity,
        Feature::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Mood => "mood",
            Feature::Energy => "energy",
            Feature::Anxiety => "anxiety",
            Feature::Sleep => "sleep",
            Feature::Activity => "activity",
            Feature::Social => "social",
            Feature::DayOfWeek => "day_of_week",
            Feature::WeatherTemp => "weather_temp",
        }
    }

    /// Human-readable name used in insight summaries
    pub fn label(&self) -> &'static str {
        match self {
            Feature::Mood => "mood",
            Feature::Energy => "energy",
            Feature::Anxiety => "anxiety",
            Feature::Sleep => "sleep",
            Feature::Activity => "activity",
            Feature::Social => "social interaction",
            Feature::DayOfWeek => "day of week",
            Feature::WeatherTemp => "temperature",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-width numeric description of one logged day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Calendar day
    pub date: NaiveDate,
    pub mood: f64,
    pub energy: f64,
    pub anxiety: f64,
    pub sleep_hours: f64,
    pub activity_minutes: f64,
    pub social_interactions: f64,
    /// Day of week, Monday = 0
    pub day_of_week: u8,
    /// Temperature covariate; `None` means absent, never zero-filled
    pub weather_temp: Option<f64>,
    /// Weather description carried through for display
    pub weather_condition: Option<String>,
    /// Number of raw records merged into this day
    pub entries: u32,
}

impl FeatureVector {
    /// Value of a feature column, `None` when the column is absent for this day
    pub fn value(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Mood => Some(self.mood),
            Feature::Energy => Some(self.energy),
            Feature::Anxiety => Some(self.anxiety),
            Feature::Sleep => Some(self.sleep_hours),
            Feature::Activity => Some(self.activity_minutes),
            Feature::Social => Some(self.social_interactions),
            Feature::DayOfWeek => Some(self.day_of_week as f64),
            Feature::WeatherTemp => self.weather_temp,
        }
    }
}

/// Deviation of one feature on one day from the window mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDeviation {
    pub feature: Feature,
    /// The day's value
    pub value: f64,
    /// Standardized deviation from the window mean
    pub z_score: f64,
}

/// Per-day output of the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub date: NaiveDate,
    /// Whether the day was flagged as anomalous
    pub is_anomaly: bool,
    /// Isolation score (0-1, higher = more isolated)
    pub score: f64,
    /// Features with the largest deviation, strongest first (flagged days only)
    pub contributing_features: Vec<FeatureDeviation>,
}

/// Behavioral or environmental covariate tested against an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Covariate {
    Sleep,
    Activity,
    Social,
    WeatherTemp,
}

impl Covariate {
    pub const ALL: [Covariate; 4] = [
        Covariate::Sleep,
        Covariate::Activity,
        Covariate::Social,
        Covariate::WeatherTemp,
    ];

    pub fn feature(&self) -> Feature {
        match self {
            Covariate::Sleep => Feature::Sleep,
            Covariate::Activity => Feature::Activity,
            Covariate::Social => Feature::Social,
            Covariate::WeatherTemp => Feature::WeatherTemp,
        }
    }
}

/// Mood dimension used as a correlation outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Mood,
    Energy,
    Anxiety,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Mood, Outcome::Energy, Outcome::Anxiety];

    pub fn feature(&self) -> Feature {
        match self {
            Outcome::Mood => Feature::Mood,
            Outcome::Energy => Feature::Energy,
            Outcome::Anxiety => Feature::Anxiety,
        }
    }

    /// Whether larger values of this outcome are better for the person
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Outcome::Anxiety)
    }
}

/// Qualitative strength of a reported correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::VeryStrong => "very strong",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationDirection {
    Positive,
    Negative,
}

/// Association between one covariate and one outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub covariate: Covariate,
    pub outcome: Outcome,
    /// Pearson coefficient in [-1, 1]
    pub coefficient: f64,
    /// Days on which both series were present
    pub sample_size: usize,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
}

impl CorrelationResult {
    /// Direction label, e.g. "higher sleep associated with higher mood"
    pub fn direction_label(&self) -> String {
        let relation = match self.direction {
            CorrelationDirection::Positive => "higher",
            CorrelationDirection::Negative => "lower",
        };
        format!(
            "higher {} associated with {} {}",
            self.covariate.feature().label(),
            relation,
            self.outcome.feature().label()
        )
    }
}

/// Which of the two trend windows a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendWindow {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Trajectory of mood over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub window: TrendWindow,
    /// Window length in calendar days (e.g. 7 or 30)
    pub window_days: u32,
    pub direction: TrendDirection,
    /// Signed least-squares slope, mood points per day
    pub magnitude: f64,
    /// Confidence proxy (0-1) from sample coverage and fit
    pub confidence: f64,
    pub sample_count: usize,
}

impl TrendResult {
    /// Window identifier such as "7-day"
    pub fn window_label(&self) -> String {
        format!("{}-day", self.window_days)
    }
}

/// Severity bucket of a composite risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Low,
    Moderate,
    Elevated,
    High,
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTier::Low => "low",
            SeverityTier::Moderate => "moderate",
            SeverityTier::Elevated => "elevated",
            SeverityTier::High => "high",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal family feeding the composite risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    Anomaly,
    Correlation,
    Trend,
    RecentLevels,
}

impl RiskSignal {
    pub fn description(&self) -> &'static str {
        match self {
            RiskSignal::Anomaly => "unusual recent days",
            RiskSignal::Correlation => "shift in a behavior linked to your mood",
            RiskSignal::Trend => "declining mood trend",
            RiskSignal::RecentLevels => "low mood or high anxiety this week",
        }
    }
}

/// Normalized (0-1) sub-scores before weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskSubScores {
    pub anomaly: f64,
    pub correlation: f64,
    pub trend: f64,
    pub recent_levels: f64,
}

impl RiskSubScores {
    pub fn get(&self, signal: RiskSignal) -> f64 {
        match signal {
            RiskSignal::Anomaly => self.anomaly,
            RiskSignal::Correlation => self.correlation,
            RiskSignal::Trend => self.trend,
            RiskSignal::RecentLevels => self.recent_levels,
        }
    }
}

/// Explains how much one signal added to the composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub signal: RiskSignal,
    pub sub_score: f64,
    /// `weight * sub_score`
    pub contribution: f64,
    /// Tier boundaries this factor pushed the composite across
    pub crossed_tiers: Vec<SeverityTier>,
}

/// Early-warning rule observed over the most recent week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSign {
    SignificantMoodDecline,
    HighMoodVolatility,
    ElevatedAnxiety,
    LowEnergy,
    InsufficientSleep,
}

impl WarningSign {
    pub fn description(&self) -> &'static str {
        match self {
            WarningSign::SignificantMoodDecline => "significant mood decline",
            WarningSign::HighMoodVolatility => "high mood volatility",
            WarningSign::ElevatedAnxiety => "elevated anxiety levels",
            WarningSign::LowEnergy => "low energy levels",
            WarningSign::InsufficientSleep => "insufficient sleep",
        }
    }
}

/// Composite early-warning assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Composite score in [0, 1]
    pub score: f64,
    pub tier: SeverityTier,
    pub sub_scores: RiskSubScores,
    pub contributing_factors: Vec<RiskFactor>,
    pub warning_signs: Vec<WarningSign>,
    pub generated_at: DateTime<Utc>,
}

/// Encouragement emitted for a clearly improving trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositiveReinforcement {
    pub trend: TrendResult,
    /// Tier of the accompanying risk assessment, if one was computed
    pub risk_tier: Option<SeverityTier>,
}

/// Structured payload of an insight, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InsightPayload {
    Anomaly(AnomalyResult),
    Correlation(CorrelationResult),
    Trend(TrendResult),
    Risk(RiskAssessment),
    PositiveReinforcement(PositiveReinforcement),
}

impl InsightPayload {
    /// Category order used when ranking insights (lower comes first)
    pub fn category_rank(&self) -> u8 {
        match self {
            InsightPayload::Risk(_) => 0,
            InsightPayload::Anomaly(_) => 1,
            InsightPayload::Correlation(_) => 2,
            InsightPayload::Trend(_) => 3,
            InsightPayload::PositiveReinforcement(_) => 4,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InsightPayload::Anomaly(_) => "anomaly",
            InsightPayload::Correlation(_) => "correlation",
            InsightPayload::Trend(_) => "trend",
            InsightPayload::Risk(_) => "risk",
            InsightPayload::PositiveReinforcement(_) => "positive_reinforcement",
        }
    }
}

/// A ready-to-render insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// 1-based rank, 1 = show first
    pub priority: u32,
    pub title: String,
    pub summary: String,
    /// Confidence (0-1)
    pub confidence: f64,
    /// Whether the insight suggests something the person can act on
    pub actionable: bool,
    pub payload: InsightPayload,
}

/// Pipeline stage that can be skipped for lack of data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Anomaly,
    Correlation,
    Trend,
    Risk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_without_optional_fields() {
        let json = r#"{
            "timestamp": "2024-03-01T21:15:00Z",
            "mood_score": 6,
            "energy_level": 5,
            "anxiety_level": 3,
            "sleep_hours": 7.5,
            "activity_minutes": 30,
            "social_interactions": 2
        }"#;

        let record: MoodRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.mood_score, 6);
        assert!(record.weather_temp.is_none());
        assert!(record.note.is_none());
        assert_eq!(record.day(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_feature_vector_weather_absent() {
        let vector = FeatureVector {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            mood: 6.0,
            energy: 5.0,
            anxiety: 3.0,
            sleep_hours: 7.0,
            activity_minutes: 20.0,
            social_interactions: 1.0,
            day_of_week: 4,
            weather_temp: None,
            weather_condition: None,
            entries: 1,
        };

        assert_eq!(vector.value(Feature::Sleep), Some(7.0));
        assert_eq!(vector.value(Feature::WeatherTemp), None);
        assert_eq!(vector.value(Feature::DayOfWeek), Some(4.0));
    }

    #[test]
    fn test_direction_label() {
        let result = CorrelationResult {
            covariate: Covariate::Sleep,
            outcome: Outcome::Anxiety,
            coefficient: -0.62,
            sample_size: 20,
            strength: CorrelationStrength::Strong,
            direction: CorrelationDirection::Negative,
        };
        assert_eq!(
            result.direction_label(),
            "higher sleep associated with lower anxiety"
        );
    }

    #[test]
    fn test_insight_payload_is_tagged() {
        let insight = Insight {
            priority: 1,
            title: "Mood trend".to_string(),
            summary: "Stable".to_string(),
            confidence: 0.8,
            actionable: false,
            payload: InsightPayload::Trend(TrendResult {
                window: TrendWindow::Short,
                window_days: 7,
                direction: TrendDirection::Stable,
                magnitude: 0.0,
                confidence: 0.8,
                sample_count: 7,
            }),
        };

        let value = serde_json::to_value(&insight).unwrap();
        assert_eq!(value["payload"]["type"], "trend");
        assert_eq!(value["payload"]["data"]["direction"], "stable");
        assert_eq!(value["payload"]["data"]["window"], "short");

        let back: Insight = serde_json::from_value(value).unwrap();
        assert_eq!(back, insight);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(SeverityTier::Low < SeverityTier::Moderate);
        assert!(SeverityTier::Elevated < SeverityTier::High);
        assert_eq!(SeverityTier::Elevated.to_string(), "elevated");
    }
}
