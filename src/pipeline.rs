//! Pipeline orchestration
//!
//! This module provides the public API of the insight engine. Every call runs
//! the stages in a fixed order:
//!
//! 1. RecordNormalizer - records to one feature vector per logged day
//! 2. AnomalyDetector - isolation forest over the window
//! 3. CorrelationAnalyzer - covariate/outcome Pearson coefficients
//! 4. TrendAnalyzer - short and long window mood slopes
//! 5. RiskScorer - weighted early-warning composite
//! 6. Composer - titles, summaries, confidence and priority ranking
//!
//! A stage without enough data is skipped and its category is left out. Only an
//! empty window is an error.

use crate::anomaly::AnomalyDetector;
use crate::config::EngineConfig;
use crate::correlation::CorrelationAnalyzer;
use crate::encoder::{InsightReport, ReportEncoder};
use crate::error::InsightError;
use crate::normalizer::RecordNormalizer;
use crate::risk::RiskScorer;
use crate::source::{AnalysisWindow, DateRange, RecordSource, WeatherSource};
use crate::trend::TrendAnalyzer;
use crate::types::{
    AnomalyResult, CorrelationDirection, CorrelationResult, Insight, InsightPayload, MoodRecord,
    PositiveReinforcement, RiskAssessment, SeverityTier, Stage, TrendDirection, TrendResult,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Confidence ceiling for anomaly insights
const ANOMALY_CONFIDENCE_CAP: f64 = 0.9;

/// Confidence ceiling for correlation insights
const CORRELATION_CONFIDENCE_CAP: f64 = 0.95;

/// Output of one composed run, before it is wrapped in a report
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub days_analyzed: usize,
    pub skipped_stages: Vec<Stage>,
    pub insights: Vec<Insight>,
}

/// Stateless insight engine.
///
/// Holds only validated configuration; every call fits its models from
/// scratch on the caller's records.
pub struct InsightEngine {
    config: EngineConfig,
    encoder: ReportEncoder,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            encoder: ReportEncoder::new(),
        }
    }
}

impl InsightEngine {
    /// Build an engine, rejecting invalid thresholds up front
    pub fn new(config: EngineConfig) -> Result<Self, InsightError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: ReportEncoder::new(),
        })
    }

    /// Build an engine from a JSON configuration (missing keys use defaults)
    pub fn from_config_json(json: &str) -> Result<Self, InsightError> {
        Self::new(EngineConfig::from_json(json)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Priority-ordered insights for a set of records.
    ///
    /// `range` limits which records are analyzed; `weather` fills temperatures
    /// missing from the records.
    pub fn compose(
        &self,
        records: &[MoodRecord],
        range: Option<&DateRange>,
        weather: Option<&dyn WeatherSource>,
    ) -> Result<Vec<Insight>, InsightError> {
        self.run(records, range, weather, Utc::now())
            .map(|composition| composition.insights)
    }

    /// Pull a user's records for the window ending today and build a report
    pub fn generate(
        &self,
        user_id: &str,
        window: AnalysisWindow,
        source: &dyn RecordSource,
        weather: Option<&dyn WeatherSource>,
    ) -> Result<InsightReport, InsightError> {
        self.generate_at(user_id, window, Utc::now(), source, weather)
    }

    /// Same as [`generate`](Self::generate) with an explicit reference time.
    ///
    /// `as_of` anchors day-count windows and stamps the report.
    pub fn generate_at(
        &self,
        user_id: &str,
        window: AnalysisWindow,
        as_of: DateTime<Utc>,
        source: &dyn RecordSource,
        weather: Option<&dyn WeatherSource>,
    ) -> Result<InsightReport, InsightError> {
        let range = window.resolve(as_of.date_naive())?;
        let records = source.records(user_id, &range)?;
        debug!(
            user_id,
            start = %range.start,
            end = %range.end,
            records = records.len(),
            "loaded mood records"
        );

        let composition = self.run(&records, Some(&range), weather, as_of)?;
        Ok(self.encoder.encode(user_id, range, as_of, composition))
    }

    /// Run every stage and compose the ranked insight list
    pub fn run(
        &self,
        records: &[MoodRecord],
        range: Option<&DateRange>,
        weather: Option<&dyn WeatherSource>,
        generated_at: DateTime<Utc>,
    ) -> Result<Composition, InsightError> {
        let config = &self.config;

        // Stage 1: one vector per logged day
        let vectors = RecordNormalizer::new(&config.scale).normalize(records, range, weather)?;

        // Stages 2-4 are independent of each other
        let anomalies = AnomalyDetector::new(&config.anomaly).detect(&vectors);
        let correlations = CorrelationAnalyzer::new(&config.correlation).analyze(&vectors);
        let trends = TrendAnalyzer::new(&config.trend).analyze(&vectors);

        // Stage 5: fold the stage outputs into a risk score
        let risk = RiskScorer::new(&config.risk, &config.scale).assess(
            &vectors,
            anomalies.as_deref(),
            correlations.as_deref(),
            trends.as_deref(),
            generated_at,
        );

        let skipped_stages: Vec<Stage> = [
            (Stage::Anomaly, anomalies.is_none()),
            (Stage::Correlation, correlations.is_none()),
            (Stage::Trend, trends.is_none()),
            (Stage::Risk, risk.is_none()),
        ]
        .into_iter()
        .filter_map(|(stage, skipped)| skipped.then_some(stage))
        .collect();

        // Stage 6: compose
        let mut insights = Vec::new();
        if let Some(assessment) = &risk {
            insights.push(risk_insight(assessment));
        }
        if let Some(anomalies) = &anomalies {
            insights.extend(anomalies.iter().filter(|a| a.is_anomaly).map(anomaly_insight));
        }
        if let Some(correlations) = &correlations {
            insights.extend(
                correlations
                    .iter()
                    .take(self.config.insights.max_correlation_insights)
                    .map(correlation_insight),
            );
        }
        if let Some(trends) = &trends {
            insights.extend(trends.iter().map(trend_insight));
            if let Some(insight) = self.reinforcement(trends, risk.as_ref()) {
                insights.push(insight);
            }
        }

        rank(&mut insights);

        info!(
            days = vectors.len(),
            insights = insights.len(),
            skipped = skipped_stages.len(),
            risk_tier = risk.as_ref().map(|r| r.tier.as_str()).unwrap_or("none"),
            "composed insights"
        );

        Ok(Composition {
            days_analyzed: vectors.len(),
            skipped_stages,
            insights,
        })
    }

    /// Encouragement for the most confident improving trend, unless risk is elevated
    fn reinforcement(
        &self,
        trends: &[TrendResult],
        risk: Option<&RiskAssessment>,
    ) -> Option<Insight> {
        let risk_tier = risk.map(|r| r.tier);
        if risk_tier.is_some_and(|tier| tier >= SeverityTier::Elevated) {
            return None;
        }

        let trend = trends
            .iter()
            .filter(|t| {
                t.direction == TrendDirection::Improving
                    && t.confidence >= self.config.insights.reinforcement_min_confidence
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))?;

        Some(Insight {
            priority: 0,
            title: "Keep it up".to_string(),
            summary: format!(
                "Your mood has been lifting over the last {} days. Whatever you have been doing seems to help.",
                trend.window_days
            ),
            confidence: trend.confidence,
            actionable: false,
            payload: InsightPayload::PositiveReinforcement(PositiveReinforcement {
                trend: trend.clone(),
                risk_tier,
            }),
        })
    }
}

fn risk_insight(assessment: &RiskAssessment) -> Insight {
    let elevated = assessment.tier >= SeverityTier::Elevated;
    let mut summary = match assessment.contributing_factors.first() {
        Some(top) if assessment.tier > SeverityTier::Low => format!(
            "Your recent pattern points to {} risk, driven mostly by {}.",
            assessment.tier,
            top.signal.description()
        ),
        _ => format!("Your recent pattern points to {} risk.", assessment.tier),
    };
    if !assessment.warning_signs.is_empty() {
        let signs: Vec<&str> = assessment
            .warning_signs
            .iter()
            .map(|s| s.description())
            .collect();
        summary.push_str(&format!(" Watch for: {}.", signs.join(", ")));
    }

    Insight {
        priority: 0,
        title: format!("Early warning: {} risk", assessment.tier),
        summary,
        confidence: if elevated {
            assessment.score
        } else {
            1.0 - assessment.score
        },
        actionable: assessment.tier >= SeverityTier::Moderate,
        payload: InsightPayload::Risk(assessment.clone()),
    }
}

fn anomaly_insight(anomaly: &AnomalyResult) -> Insight {
    let summary = if anomaly.contributing_features.is_empty() {
        format!("{} stood out from your usual pattern.", anomaly.date)
    } else {
        let drivers: Vec<String> = anomaly
            .contributing_features
            .iter()
            .map(|d| {
                let side = if d.z_score >= 0.0 { "high" } else { "low" };
                format!("{} {} ({:.1})", side, d.feature.label(), d.value)
            })
            .collect();
        format!(
            "{} stood out from your usual pattern: {}.",
            anomaly.date,
            drivers.join(", ")
        )
    };

    Insight {
        priority: 0,
        title: format!("Unusual day on {}", anomaly.date.format("%b %-d")),
        summary,
        confidence: anomaly.score.min(ANOMALY_CONFIDENCE_CAP),
        actionable: true,
        payload: InsightPayload::Anomaly(anomaly.clone()),
    }
}

fn correlation_insight(correlation: &CorrelationResult) -> Insight {
    let covariate = correlation.covariate.feature().label();
    let outcome = correlation.outcome.feature().label();
    let relation = match correlation.direction {
        CorrelationDirection::Positive => "tend to rise together",
        CorrelationDirection::Negative => "tend to move in opposite directions",
    };

    Insight {
        priority: 0,
        title: format!("Your {covariate} and {outcome} are linked"),
        summary: format!(
            "Your {covariate} and {outcome} {relation}: {} (r = {:.2}, {} correlation over {} days).",
            correlation.direction_label(),
            correlation.coefficient,
            correlation.strength.as_str(),
            correlation.sample_size
        ),
        confidence: correlation.coefficient.abs().min(CORRELATION_CONFIDENCE_CAP),
        actionable: true,
        payload: InsightPayload::Correlation(correlation.clone()),
    }
}

fn trend_insight(trend: &TrendResult) -> Insight {
    let summary = match trend.direction {
        TrendDirection::Stable => format!(
            "Your mood has held steady over the last {} days.",
            trend.window_days
        ),
        direction => format!(
            "Your mood has been {} by about {:.2} points per day over the last {} days.",
            direction.as_str(),
            trend.magnitude.abs(),
            trend.window_days
        ),
    };

    Insight {
        priority: 0,
        title: format!("{} mood trend: {}", trend.window_label(), trend.direction.as_str()),
        summary,
        confidence: trend.confidence,
        actionable: trend.direction == TrendDirection::Declining,
        payload: InsightPayload::Trend(trend.clone()),
    }
}

/// Sort by category then within-category order, and assign 1-based priorities
fn rank(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        a.payload
            .category_rank()
            .cmp(&b.payload.category_rank())
            .then_with(|| within_category(&a.payload, &b.payload))
    });
    for (i, insight) in insights.iter_mut().enumerate() {
        insight.priority = i as u32 + 1;
    }
}

fn within_category(a: &InsightPayload, b: &InsightPayload) -> Ordering {
    match (a, b) {
        (InsightPayload::Risk(a), InsightPayload::Risk(b)) => b.score.total_cmp(&a.score),
        (InsightPayload::Anomaly(a), InsightPayload::Anomaly(b)) => {
            b.score.total_cmp(&a.score).then_with(|| b.date.cmp(&a.date))
        }
        (InsightPayload::Correlation(a), InsightPayload::Correlation(b)) => {
            b.coefficient.abs().total_cmp(&a.coefficient.abs())
        }
        (InsightPayload::Trend(a), InsightPayload::Trend(b)) => direction_rank(a.direction)
            .cmp(&direction_rank(b.direction))
            .then_with(|| a.window.cmp(&b.window)),
        (InsightPayload::PositiveReinforcement(a), InsightPayload::PositiveReinforcement(b)) => {
            a.trend.window.cmp(&b.trend.window)
        }
        _ => Ordering::Equal,
    }
}

fn direction_rank(direction: TrendDirection) -> u8 {
    match direction {
        TrendDirection::Declining => 0,
        TrendDirection::Improving => 1,
        TrendDirection::Stable => 2,
    }
}
