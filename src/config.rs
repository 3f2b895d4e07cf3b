//! Engine configuration
//!
//! Every threshold the engine uses lives here with its documented default.
//! Configuration is validated once, when the engine is built; a config that
//! passes [`EngineConfig::validate`] can never fail an analysis run.

use crate::error::InsightError;
use serde::{Deserialize, Serialize};

/// Share of days flagged as anomalous (top 10%)
pub const DEFAULT_ANOMALY_CONTAMINATION: f64 = 0.10;
/// Minimum days before the anomaly model is fit
pub const DEFAULT_ANOMALY_MIN_DAYS: usize = 14;
/// Trees in the isolation forest
pub const DEFAULT_ANOMALY_TREES: usize = 100;
/// Largest subsample drawn per tree
pub const DEFAULT_ANOMALY_SUBSAMPLE: usize = 256;
/// Features reported per flagged day
pub const DEFAULT_ANOMALY_TOP_FEATURES: usize = 3;
/// RNG seed for the forest
pub const DEFAULT_ANOMALY_SEED: u64 = 42;

/// Minimum paired samples for a correlation
pub const DEFAULT_CORRELATION_MIN_SAMPLES: usize = 10;
/// |r| boundaries: weak/moderate, moderate/strong, strong/very strong
pub const DEFAULT_CORRELATION_TIERS: [f64; 3] = [0.3, 0.5, 0.7];

/// Longest trend or recent window, in days
pub const MAX_WINDOW_DAYS: u32 = 3650;

pub const DEFAULT_TREND_SHORT_DAYS: u32 = 7;
pub const DEFAULT_TREND_LONG_DAYS: u32 = 30;
pub const DEFAULT_TREND_SHORT_MIN_SAMPLES: usize = 6;
pub const DEFAULT_TREND_LONG_MIN_SAMPLES: usize = 14;
/// Smallest slope (mood points/day) that can count as a trend
pub const DEFAULT_TREND_MIN_SLOPE: f64 = 0.05;
/// Slope must exceed this many standard errors to count as a trend
pub const DEFAULT_TREND_NOISE_MULTIPLIER: f64 = 2.0;

pub const DEFAULT_RISK_MIN_DAYS: usize = 14;
pub const DEFAULT_RISK_RECENT_DAYS: u32 = 7;
/// Declining slope (points/day) that saturates the trend sub-score
pub const DEFAULT_RISK_SLOPE_SATURATION: f64 = 0.2;
/// low/moderate, moderate/elevated, elevated/high
pub const DEFAULT_RISK_TIERS: [f64; 3] = [0.25, 0.5, 0.75];

/// Minimum trend confidence before an improving trend earns encouragement
pub const DEFAULT_REINFORCEMENT_MIN_CONFIDENCE: f64 = 0.5;
/// Correlation insights emitted per report, strongest first
pub const DEFAULT_MAX_CORRELATION_INSIGHTS: usize = 3;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub scale: ScaleConfig,
    pub anomaly: AnomalyConfig,
    pub correlation: CorrelationConfig,
    pub trend: TrendConfig,
    pub risk: RiskConfig,
    pub insights: InsightConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, InsightError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, InsightError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every threshold and weight
    pub fn validate(&self) -> Result<(), InsightError> {
        self.scale.validate()?;
        self.anomaly.validate()?;
        self.correlation.validate()?;
        self.trend.validate()?;
        self.risk.validate()?;
        self.insights.validate()
    }
}

fn invalid(message: impl Into<String>) -> InsightError {
    InsightError::Configuration(message.into())
}

fn check_unit(name: &str, value: f64) -> Result<(), InsightError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

fn check_ascending(name: &str, tiers: &[f64; 3]) -> Result<(), InsightError> {
    for &t in tiers {
        if !t.is_finite() || t <= 0.0 || t >= 1.0 {
            return Err(invalid(format!(
                "{name} boundaries must lie strictly between 0 and 1, got {t}"
            )));
        }
    }
    if !(tiers[0] < tiers[1] && tiers[1] < tiers[2]) {
        return Err(invalid(format!(
            "{name} boundaries must be strictly ascending, got {tiers:?}"
        )));
    }
    Ok(())
}

/// Range of the ordinal mood/energy/anxiety scales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub ordinal_min: u8,
    pub ordinal_max: u8,
    /// Upper bound accepted for reported sleep
    pub max_sleep_hours: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            ordinal_min: 1,
            ordinal_max: 10,
            max_sleep_hours: 24.0,
        }
    }
}

impl ScaleConfig {
    pub fn span(&self) -> f64 {
        (self.ordinal_max - self.ordinal_min) as f64
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.ordinal_min..=self.ordinal_max).contains(&value)
    }

    fn validate(&self) -> Result<(), InsightError> {
        if self.ordinal_min >= self.ordinal_max {
            return Err(invalid(format!(
                "scale.ordinal_min ({}) must be below scale.ordinal_max ({})",
                self.ordinal_min, self.ordinal_max
            )));
        }
        if !self.max_sleep_hours.is_finite() || self.max_sleep_hours <= 0.0 {
            return Err(invalid("scale.max_sleep_hours must be positive"));
        }
        Ok(())
    }
}

/// Isolation forest settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Fraction of days above the percentile threshold (0.1 = top 10%)
    pub contamination: f64,
    pub min_days: usize,
    pub trees: usize,
    pub subsample_size: usize,
    pub top_features: usize,
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination: DEFAULT_ANOMALY_CONTAMINATION,
            min_days: DEFAULT_ANOMALY_MIN_DAYS,
            trees: DEFAULT_ANOMALY_TREES,
            subsample_size: DEFAULT_ANOMALY_SUBSAMPLE,
            top_features: DEFAULT_ANOMALY_TOP_FEATURES,
            seed: DEFAULT_ANOMALY_SEED,
        }
    }
}

impl AnomalyConfig {
    fn validate(&self) -> Result<(), InsightError> {
        if !(self.contamination > 0.0 && self.contamination < 0.5) {
            return Err(invalid(format!(
                "anomaly.contamination must be in (0, 0.5), got {}",
                self.contamination
            )));
        }
        if self.min_days < 2 {
            return Err(invalid("anomaly.min_days must be at least 2"));
        }
        if self.trees == 0 {
            return Err(invalid("anomaly.trees must be positive"));
        }
        if self.subsample_size < 2 {
            return Err(invalid("anomaly.subsample_size must be at least 2"));
        }
        Ok(())
    }
}

/// Correlation mining settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub min_samples: usize,
    /// |r| boundaries for moderate, strong and very strong
    pub strength_tiers: [f64; 3],
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_CORRELATION_MIN_SAMPLES,
            strength_tiers: DEFAULT_CORRELATION_TIERS,
        }
    }
}

impl CorrelationConfig {
    fn validate(&self) -> Result<(), InsightError> {
        if self.min_samples < 3 {
            return Err(invalid("correlation.min_samples must be at least 3"));
        }
        check_ascending("correlation.strength_tiers", &self.strength_tiers)
    }
}

/// Trend window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub short_window_days: u32,
    pub long_window_days: u32,
    pub short_min_samples: usize,
    pub long_min_samples: usize,
    pub min_slope: f64,
    pub noise_multiplier: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            short_window_days: DEFAULT_TREND_SHORT_DAYS,
            long_window_days: DEFAULT_TREND_LONG_DAYS,
            short_min_samples: DEFAULT_TREND_SHORT_MIN_SAMPLES,
            long_min_samples: DEFAULT_TREND_LONG_MIN_SAMPLES,
            min_slope: DEFAULT_TREND_MIN_SLOPE,
            noise_multiplier: DEFAULT_TREND_NOISE_MULTIPLIER,
        }
    }
}

impl TrendConfig {
    fn validate(&self) -> Result<(), InsightError> {
        if self.short_window_days < 2 || self.short_window_days >= self.long_window_days {
            return Err(invalid(format!(
                "trend windows must satisfy 2 <= short ({}) < long ({})",
                self.short_window_days, self.long_window_days
            )));
        }
        if self.long_window_days > MAX_WINDOW_DAYS {
            return Err(invalid(format!(
                "trend.long_window_days ({}) cannot exceed {MAX_WINDOW_DAYS}",
                self.long_window_days
            )));
        }
        if self.short_min_samples < 3 || self.long_min_samples < 3 {
            return Err(invalid("trend minimum samples must be at least 3"));
        }
        if self.short_min_samples > self.short_window_days as usize
            || self.long_min_samples > self.long_window_days as usize
        {
            return Err(invalid(
                "trend minimum samples cannot exceed the window length",
            ));
        }
        if !self.min_slope.is_finite() || self.min_slope < 0.0 {
            return Err(invalid("trend.min_slope must be non-negative"));
        }
        if !self.noise_multiplier.is_finite() || self.noise_multiplier < 0.0 {
            return Err(invalid("trend.noise_multiplier must be non-negative"));
        }
        Ok(())
    }
}

/// Weights applied to the normalized risk sub-scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub anomaly: f64,
    pub correlation: f64,
    pub trend: f64,
    pub recent_levels: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            anomaly: 0.2,
            correlation: 0.2,
            trend: 0.4,
            recent_levels: 0.2,
        }
    }
}

impl RiskWeights {
    pub fn sum(&self) -> f64 {
        self.anomaly + self.correlation + self.trend + self.recent_levels
    }
}

/// Risk scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    /// Boundaries separating low/moderate/elevated/high
    pub tier_boundaries: [f64; 3],
    pub min_days: usize,
    /// Days counted as "recent" for levels, anomalies and warning signs
    pub recent_days: u32,
    pub slope_saturation: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            tier_boundaries: DEFAULT_RISK_TIERS,
            min_days: DEFAULT_RISK_MIN_DAYS,
            recent_days: DEFAULT_RISK_RECENT_DAYS,
            slope_saturation: DEFAULT_RISK_SLOPE_SATURATION,
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<(), InsightError> {
        let w = &self.weights;
        check_unit("risk.weights.anomaly", w.anomaly)?;
        check_unit("risk.weights.correlation", w.correlation)?;
        check_unit("risk.weights.trend", w.trend)?;
        check_unit("risk.weights.recent_levels", w.recent_levels)?;
        if w.sum() <= 0.0 {
            return Err(invalid("risk weights must not all be zero"));
        }
        check_ascending("risk.tier_boundaries", &self.tier_boundaries)?;
        // A flat window only carries the levels sub-score; it must stay low.
        if w.recent_levels >= self.tier_boundaries[0] {
            return Err(invalid(format!(
                "risk.weights.recent_levels ({}) must be below the first tier boundary ({})",
                w.recent_levels, self.tier_boundaries[0]
            )));
        }
        if self.min_days < 2 {
            return Err(invalid("risk.min_days must be at least 2"));
        }
        if self.recent_days == 0 {
            return Err(invalid("risk.recent_days must be positive"));
        }
        if self.recent_days > MAX_WINDOW_DAYS {
            return Err(invalid(format!(
                "risk.recent_days ({}) cannot exceed {MAX_WINDOW_DAYS}",
                self.recent_days
            )));
        }
        if !self.slope_saturation.is_finite() || self.slope_saturation <= 0.0 {
            return Err(invalid("risk.slope_saturation must be positive"));
        }
        Ok(())
    }
}

/// Composer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub reinforcement_min_confidence: f64,
    /// Strongest correlations turned into insights; the rest still feed risk
    pub max_correlation_insights: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            reinforcement_min_confidence: DEFAULT_REINFORCEMENT_MIN_CONFIDENCE,
            max_correlation_insights: DEFAULT_MAX_CORRELATION_INSIGHTS,
        }
    }
}

impl InsightConfig {
    fn validate(&self) -> Result<(), InsightError> {
        check_unit(
            "insights.reinforcement_min_confidence",
            self.reinforcement_min_confidence,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"anomaly": {"min_days": 21}}"#).unwrap();

        assert_eq!(config.anomaly.min_days, 21);
        assert_eq!(config.anomaly.contamination, DEFAULT_ANOMALY_CONTAMINATION);
        assert_eq!(config.trend, TrendConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_unordered_tiers() {
        let mut config = EngineConfig::default();
        config.risk.tier_boundaries = [0.5, 0.25, 0.75];

        let err = config.validate().unwrap_err();
        assert!(matches!(err, InsightError::Configuration(_)));
    }

    #[test]
    fn test_rejects_zero_weights() {
        let mut config = EngineConfig::default();
        config.risk.weights = RiskWeights {
            anomaly: 0.0,
            correlation: 0.0,
            trend: 0.0,
            recent_levels: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_weight() {
        let mut config = EngineConfig::default();
        config.risk.weights.trend = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_contamination() {
        let mut config = EngineConfig::default();
        config.anomaly.contamination = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_trend_windows() {
        let mut config = EngineConfig::default();
        config.trend.short_window_days = 30;
        config.trend.long_window_days = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_invalid_json_values() {
        let result =
            EngineConfig::from_json(r#"{"correlation": {"strength_tiers": [0.3, 0.3, 0.7]}}"#);
        assert!(matches!(result, Err(InsightError::Configuration(_))));
    }

    #[test]
    fn test_rejects_huge_trend_window() {
        let mut config = EngineConfig::default();
        config.trend.long_window_days = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(InsightError::Configuration(_))
        ));

        config.trend.long_window_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_huge_recent_days() {
        let mut config = EngineConfig::default();
        config.risk.recent_days = MAX_WINDOW_DAYS + 1;
        assert!(matches!(
            config.validate(),
            Err(InsightError::Configuration(_))
        ));
    }

    #[test]
    fn test_levels_weight_stays_below_first_tier() {
        let mut config = EngineConfig::default();
        assert!(config.risk.weights.recent_levels < config.risk.tier_boundaries[0]);

        config.risk.weights.recent_levels = 0.3;
        assert!(matches!(
            config.validate(),
            Err(InsightError::Configuration(_))
        ));
    }

    #[test]
    fn test_partial_json_keeps_correlation_cap() {
        let config =
            EngineConfig::from_json(r#"{"insights": {"reinforcement_min_confidence": 0.7}}"#)
                .unwrap();
        assert_eq!(
            config.insights.max_correlation_insights,
            DEFAULT_MAX_CORRELATION_INSIGHTS
        );
    }
}
