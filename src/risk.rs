//! Early-warning risk scoring
//!
//! Folds the anomaly, correlation and trend results together with the most
//! recent mood and anxiety levels into one bounded score:
//!
//! ```text
//! risk = clamp(w_anomaly     * anomaly
//!            + w_correlation * correlation
//!            + w_trend       * trend
//!            + w_levels      * recent_levels, 0, 1)
//! ```
//!
//! Every sub-score is normalized to [0, 1] before weighting, so the composite is
//! non-decreasing in each of them.

use crate::config::{RiskConfig, ScaleConfig};
use crate::stats;
use crate::types::{
    AnomalyResult, CorrelationResult, Covariate, FeatureVector, RiskAssessment, RiskFactor,
    RiskSignal, RiskSubScores, SeverityTier, TrendDirection, TrendResult, WarningSign,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

/// Isolation score of an unremarkable day
const NEUTRAL_ANOMALY_SCORE: f64 = 0.5;

/// Standard deviations of covariate shift that saturate the correlation signal
const SHIFT_SATURATION_SD: f64 = 2.0;

/// Average nightly sleep below this counts as a warning sign
const INSUFFICIENT_SLEEP_HOURS: f64 = 6.0;

const SIGNALS: [RiskSignal; 4] = [
    RiskSignal::Anomaly,
    RiskSignal::Correlation,
    RiskSignal::Trend,
    RiskSignal::RecentLevels,
];

const BOUNDARY_TIERS: [SeverityTier; 3] = [
    SeverityTier::Moderate,
    SeverityTier::Elevated,
    SeverityTier::High,
];

/// Scorer combining stage outputs into a [`RiskAssessment`]
pub struct RiskScorer<'a> {
    config: &'a RiskConfig,
    scale: &'a ScaleConfig,
}

impl<'a> RiskScorer<'a> {
    pub fn new(config: &'a RiskConfig, scale: &'a ScaleConfig) -> Self {
        Self { config, scale }
    }

    /// Assess the window. Returns `None` below the configured minimum of days.
    pub fn assess(
        &self,
        vectors: &[FeatureVector],
        anomalies: Option<&[AnomalyResult]>,
        correlations: Option<&[CorrelationResult]>,
        trends: Option<&[TrendResult]>,
        generated_at: DateTime<Utc>,
    ) -> Option<RiskAssessment> {
        if vectors.len() < self.config.min_days {
            debug!(
                days = vectors.len(),
                min_days = self.config.min_days,
                "risk stage skipped"
            );
            return None;
        }

        let last = vectors.last()?.date;
        let recent_start = last - Duration::days(self.config.recent_days as i64 - 1);

        let sub_scores = RiskSubScores {
            anomaly: anomalies.map_or(0.0, |a| anomaly_signal(a, recent_start)),
            correlation: correlations
                .map_or(0.0, |c| correlation_signal(c, vectors, recent_start)),
            trend: trends.map_or(0.0, |t| self.trend_signal(t)),
            recent_levels: self.levels_signal(vectors, recent_start),
        };

        let (score, contributing_factors) = self.combine(&sub_scores);
        let tier = self.tier_for(score);
        let warning_signs = self.warning_signs(vectors, recent_start);

        debug!(score, tier = %tier, signs = warning_signs.len(), "risk stage complete");

        Some(RiskAssessment {
            score,
            tier,
            sub_scores,
            contributing_factors,
            warning_signs,
            generated_at,
        })
    }

    /// Weighted sum clipped to [0, 1], plus per-signal attribution.
    ///
    /// Contributions are accumulated largest first; a factor is credited with
    /// every tier boundary the running total crosses when it is added.
    pub fn combine(&self, sub_scores: &RiskSubScores) -> (f64, Vec<RiskFactor>) {
        let mut weighted: Vec<(RiskSignal, f64, f64)> = SIGNALS
            .iter()
            .map(|&signal| {
                let sub = sub_scores.get(signal).clamp(0.0, 1.0);
                (signal, sub, self.weight(signal) * sub)
            })
            .collect();
        weighted.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut running = 0.0;
        let mut factors = Vec::new();
        for (signal, sub_score, contribution) in weighted {
            if contribution <= 0.0 {
                continue;
            }
            let before = running;
            running += contribution;
            let crossed_tiers = self
                .config
                .tier_boundaries
                .iter()
                .zip(BOUNDARY_TIERS)
                .filter(|&(&b, _)| before < b && b <= running)
                .map(|(_, tier)| tier)
                .collect();
            factors.push(RiskFactor {
                signal,
                sub_score,
                contribution,
                crossed_tiers,
            });
        }

        (running.clamp(0.0, 1.0), factors)
    }

    pub fn tier_for(&self, score: f64) -> SeverityTier {
        let [moderate, elevated, high] = self.config.tier_boundaries;
        if score >= high {
            SeverityTier::High
        } else if score >= elevated {
            SeverityTier::Elevated
        } else if score >= moderate {
            SeverityTier::Moderate
        } else {
            SeverityTier::Low
        }
    }

    fn weight(&self, signal: RiskSignal) -> f64 {
        let w = &self.config.weights;
        match signal {
            RiskSignal::Anomaly => w.anomaly,
            RiskSignal::Correlation => w.correlation,
            RiskSignal::Trend => w.trend,
            RiskSignal::RecentLevels => w.recent_levels,
        }
    }

    /// Strongest declining trend, scaled by slope and confidence
    fn trend_signal(&self, trends: &[TrendResult]) -> f64 {
        trends
            .iter()
            .filter(|t| t.direction == TrendDirection::Declining)
            .map(|t| (t.magnitude.abs() / self.config.slope_saturation).min(1.0) * t.confidence)
            .fold(0.0, f64::max)
    }

    /// Mean of the recent mood deficit and anxiety excess on the ordinal scale
    fn levels_signal(&self, vectors: &[FeatureVector], recent_start: NaiveDate) -> f64 {
        let recent: Vec<&FeatureVector> =
            vectors.iter().filter(|v| v.date >= recent_start).collect();
        let mood: Vec<f64> = recent.iter().map(|v| v.mood).collect();
        let anxiety: Vec<f64> = recent.iter().map(|v| v.anxiety).collect();

        let (Some(mood), Some(anxiety)) = (stats::mean(&mood), stats::mean(&anxiety)) else {
            return 0.0;
        };

        let min = self.scale.ordinal_min as f64;
        let max = self.scale.ordinal_max as f64;
        let span = self.scale.span();
        let mood_deficit = ((max - mood) / span).clamp(0.0, 1.0);
        let anxiety_excess = ((anxiety - min) / span).clamp(0.0, 1.0);
        (mood_deficit + anxiety_excess) / 2.0
    }

    /// Rule-based early-warning signs over the recent window and the one before it
    fn warning_signs(
        &self,
        vectors: &[FeatureVector],
        recent_start: NaiveDate,
    ) -> Vec<WarningSign> {
        let prior_start = recent_start - Duration::days(self.config.recent_days as i64);
        let column =
            |from: NaiveDate, to: Option<NaiveDate>, f: fn(&FeatureVector) -> f64| -> Vec<f64> {
                vectors
                    .iter()
                    .filter(|v| v.date >= from && to.map_or(true, |t| v.date < t))
                    .map(f)
                    .collect()
            };

        let recent_mood = column(recent_start, None, |v| v.mood);
        let prior_mood = column(prior_start, Some(recent_start), |v| v.mood);
        let recent_anxiety = column(recent_start, None, |v| v.anxiety);
        let recent_energy = column(recent_start, None, |v| v.energy);
        let recent_sleep = column(recent_start, None, |v| v.sleep_hours);

        let min = self.scale.ordinal_min as f64;
        let third = self.scale.span() / 3.0;
        let mut signs = Vec::new();

        if let (Some(recent), Some(prior)) = (stats::mean(&recent_mood), stats::mean(&prior_mood)) {
            if prior - recent >= third {
                signs.push(WarningSign::SignificantMoodDecline);
            }
        }
        if recent_mood.len() >= 2 && stats::std_dev(&recent_mood).is_some_and(|sd| sd > third) {
            signs.push(WarningSign::HighMoodVolatility);
        }
        if stats::mean(&recent_anxiety).is_some_and(|a| a > min + 2.0 * third) {
            signs.push(WarningSign::ElevatedAnxiety);
        }
        if stats::mean(&recent_energy).is_some_and(|e| e < min + third) {
            signs.push(WarningSign::LowEnergy);
        }
        if stats::mean(&recent_sleep).is_some_and(|s| s < INSUFFICIENT_SLEEP_HOURS) {
            signs.push(WarningSign::InsufficientSleep);
        }
        signs
    }
}

/// Most isolated recent flagged day, rescaled so an ordinary day scores 0
fn anomaly_signal(anomalies: &[AnomalyResult], recent_start: NaiveDate) -> f64 {
    anomalies
        .iter()
        .filter(|a| a.is_anomaly && a.date >= recent_start)
        .map(|a| {
            ((a.score - NEUTRAL_ANOMALY_SCORE) / (1.0 - NEUTRAL_ANOMALY_SCORE)).clamp(0.0, 1.0)
        })
        .fold(0.0, f64::max)
}

/// Strongest correlation whose covariate has recently moved in the harmful direction
fn correlation_signal(
    correlations: &[CorrelationResult],
    vectors: &[FeatureVector],
    recent_start: NaiveDate,
) -> f64 {
    correlations
        .iter()
        .filter_map(|c| {
            let shift = recent_shift(vectors, c.covariate, recent_start)?;
            // predicted change in the outcome from the covariate's move
            let predicted = c.coefficient.signum() * shift;
            let harmful = if c.outcome.higher_is_better() {
                predicted < 0.0
            } else {
                predicted > 0.0
            };
            harmful.then(|| c.coefficient.abs() * (shift.abs() / SHIFT_SATURATION_SD).min(1.0))
        })
        .fold(0.0, f64::max)
}

/// Recent mean of a covariate minus its window mean, in window standard deviations
fn recent_shift(
    vectors: &[FeatureVector],
    covariate: Covariate,
    recent_start: NaiveDate,
) -> Option<f64> {
    let feature = covariate.feature();
    let all: Vec<f64> = vectors.iter().filter_map(|v| v.value(feature)).collect();
    let recent: Vec<f64> = vectors
        .iter()
        .filter(|v| v.date >= recent_start)
        .filter_map(|v| v.value(feature))
        .collect();

    let sd = stats::std_dev(&all)?;
    if sd <= 0.0 {
        return None;
    }
    Some((stats::mean(&recent)? - stats::mean(&all)?) / sd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CorrelationDirection, CorrelationStrength, Outcome, TrendWindow};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + Duration::days(offset)
    }

    fn vector(offset: i64, mood: f64, anxiety: f64, sleep: f64) -> FeatureVector {
        FeatureVector {
            date: day(offset),
            mood,
            energy: 6.0,
            anxiety,
            sleep_hours: sleep,
            activity_minutes: 30.0,
            social_interactions: 2.0,
            day_of_week: (offset % 7) as u8,
            weather_temp: None,
            weather_condition: None,
            entries: 1,
        }
    }

    fn steady(days: i64) -> Vec<FeatureVector> {
        (0..days).map(|d| vector(d, 7.0, 3.0, 8.0)).collect()
    }

    #[test]
    fn test_tier_boundaries() {
        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let scorer = RiskScorer::new(&config, &scale);

        assert_eq!(scorer.tier_for(0.0), SeverityTier::Low);
        assert_eq!(scorer.tier_for(0.2499), SeverityTier::Low);
        assert_eq!(scorer.tier_for(0.25), SeverityTier::Moderate);
        assert_eq!(scorer.tier_for(0.5), SeverityTier::Elevated);
        assert_eq!(scorer.tier_for(0.75), SeverityTier::High);
        assert_eq!(scorer.tier_for(1.0), SeverityTier::High);
    }

    #[test]
    fn test_steady_window_is_low() {
        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let vectors = steady(30);

        let assessment = RiskScorer::new(&config, &scale)
            .assess(&vectors, Some(&[]), Some(&[]), Some(&[]), generated_at())
            .unwrap();

        assert_eq!(assessment.tier, SeverityTier::Low);
        assert_eq!(assessment.sub_scores.anomaly, 0.0);
        assert_eq!(assessment.sub_scores.trend, 0.0);
        assert!(assessment.warning_signs.is_empty());
        assert_eq!(assessment.generated_at, generated_at());
    }

    #[test]
    fn test_levels_alone_stay_low() {
        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let scorer = RiskScorer::new(&config, &scale);

        for (mood, anxiety) in [(7.0, 3.0), (4.0, 6.0), (2.0, 9.0), (1.0, 10.0)] {
            let vectors: Vec<FeatureVector> =
                (0..60).map(|d| vector(d, mood, anxiety, 8.0)).collect();
            let assessment = scorer
                .assess(&vectors, Some(&[]), Some(&[]), Some(&[]), generated_at())
                .unwrap();
            assert_eq!(
                assessment.tier,
                SeverityTier::Low,
                "mood {mood} anxiety {anxiety} scored {}",
                assessment.score
            );
        }
    }

    #[test]
    fn test_short_window_skipped() {
        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let result =
            RiskScorer::new(&config, &scale).assess(&steady(13), None, None, None, generated_at());
        assert!(result.is_none());
    }

    #[test]
    fn test_combine_attributes_crossed_tiers() {
        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let scorer = RiskScorer::new(&config, &scale);

        let (score, factors) = scorer.combine(&RiskSubScores {
            anomaly: 0.0,
            correlation: 0.6,
            trend: 0.8,
            recent_levels: 0.4,
        });

        // 0.32 + 0.12 + 0.08
        assert!((score - 0.52).abs() < 1e-12);
        assert_eq!(factors.len(), 3);
        assert_eq!(factors[0].signal, RiskSignal::Trend);
        assert_eq!(factors[0].crossed_tiers, vec![SeverityTier::Moderate]);
        assert_eq!(factors[1].signal, RiskSignal::Correlation);
        assert_eq!(factors[1].crossed_tiers, Vec::<SeverityTier>::new());
        assert_eq!(factors[2].signal, RiskSignal::RecentLevels);
        assert_eq!(factors[2].crossed_tiers, vec![SeverityTier::Elevated]);
    }

    #[test]
    fn test_declining_trend_signal() {
        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let scorer = RiskScorer::new(&config, &scale);

        let trends = vec![
            TrendResult {
                window: TrendWindow::Short,
                window_days: 7,
                direction: TrendDirection::Declining,
                magnitude: -0.1,
                confidence: 0.8,
                sample_count: 7,
            },
            TrendResult {
                window: TrendWindow::Long,
                window_days: 30,
                direction: TrendDirection::Improving,
                magnitude: 0.5,
                confidence: 1.0,
                sample_count: 30,
            },
        ];
        assert!((scorer.trend_signal(&trends) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_only_recent_flagged_anomalies_count() {
        let anomalies = vec![
            AnomalyResult {
                date: day(2),
                is_anomaly: true,
                score: 0.9,
                contributing_features: vec![],
            },
            AnomalyResult {
                date: day(28),
                is_anomaly: true,
                score: 0.7,
                contributing_features: vec![],
            },
            AnomalyResult {
                date: day(29),
                is_anomaly: false,
                score: 0.8,
                contributing_features: vec![],
            },
        ];
        let signal = anomaly_signal(&anomalies, day(23));
        assert!((signal - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_signal_needs_harmful_shift() {
        // sleep falls over the last week
        let vectors: Vec<FeatureVector> = (0..28)
            .map(|d| vector(d, 6.0, 3.0, if d >= 21 { 5.0 } else { 8.0 }))
            .collect();
        let correlation = |coefficient: f64| CorrelationResult {
            covariate: Covariate::Sleep,
            outcome: Outcome::Mood,
            coefficient,
            sample_size: 28,
            strength: CorrelationStrength::Strong,
            direction: if coefficient > 0.0 {
                CorrelationDirection::Positive
            } else {
                CorrelationDirection::Negative
            },
        };

        // more sleep goes with better mood, so less sleep is harmful
        assert!(correlation_signal(&[correlation(0.6)], &vectors, day(21)) > 0.0);
        // more sleep goes with worse mood, so less sleep is not
        assert_eq!(correlation_signal(&[correlation(-0.6)], &vectors, day(21)), 0.0);
    }

    #[test]
    fn test_warning_signs() {
        let mut vectors: Vec<FeatureVector> = (0..7).map(|d| vector(d, 8.0, 3.0, 8.0)).collect();
        vectors.extend((7..14).map(|d| {
            let mut v = vector(d, 3.0, 8.0, 5.0);
            v.energy = 2.0;
            v
        }));

        let config = RiskConfig::default();
        let scale = ScaleConfig::default();
        let assessment = RiskScorer::new(&config, &scale)
            .assess(&vectors, None, None, None, generated_at())
            .unwrap();

        assert_eq!(
            assessment.warning_signs,
            vec![
                WarningSign::SignificantMoodDecline,
                WarningSign::ElevatedAnxiety,
                WarningSign::LowEnergy,
                WarningSign::InsufficientSleep,
            ]
        );
    }

    fn sub_scores_strategy() -> impl Strategy<Value = RiskSubScores> {
        (0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(a, c, t, l)| {
            RiskSubScores {
                anomaly: a,
                correlation: c,
                trend: t,
                recent_levels: l,
            }
        })
    }

    proptest! {
        #[test]
        fn prop_composite_monotonic(
            base in sub_scores_strategy(),
            bump in 0.0f64..=1.0,
            which in 0usize..4,
        ) {
            let config = RiskConfig::default();
            let scale = ScaleConfig::default();
            let scorer = RiskScorer::new(&config, &scale);

            let mut raised = base;
            match which {
                0 => raised.anomaly = (raised.anomaly + bump).min(1.0),
                1 => raised.correlation = (raised.correlation + bump).min(1.0),
                2 => raised.trend = (raised.trend + bump).min(1.0),
                _ => raised.recent_levels = (raised.recent_levels + bump).min(1.0),
            }

            let (before, _) = scorer.combine(&base);
            let (after, _) = scorer.combine(&raised);
            prop_assert!(after >= before - 1e-12);
            prop_assert!((0.0..=1.0).contains(&after));
        }
    }
}
