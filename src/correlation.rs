//! Correlation mining
//!
//! Computes Pearson coefficients between each behavioral covariate and each mood
//! outcome over the days where both are present. Weak or under-sampled pairs are
//! left out entirely rather than reported with a misleading coefficient.
//!
//! No correction for multiple comparisons is applied across the covariate and
//! outcome pairs. This is a known limitation of the analysis.

use crate::config::CorrelationConfig;
use crate::stats;
use crate::types::{
    CorrelationDirection, CorrelationResult, CorrelationStrength, Covariate, FeatureVector,
    Outcome,
};
use tracing::debug;

/// Analyzer for covariate/outcome associations
pub struct CorrelationAnalyzer<'a> {
    config: &'a CorrelationConfig,
}

impl<'a> CorrelationAnalyzer<'a> {
    pub fn new(config: &'a CorrelationConfig) -> Self {
        Self { config }
    }

    /// Map |r| to a strength tier; `None` means weak and suppressed
    pub fn classify(&self, coefficient: f64) -> Option<CorrelationStrength> {
        let [moderate, strong, very_strong] = self.config.strength_tiers;
        let r = coefficient.abs();
        if r >= very_strong {
            Some(CorrelationStrength::VeryStrong)
        } else if r >= strong {
            Some(CorrelationStrength::Strong)
        } else if r >= moderate {
            Some(CorrelationStrength::Moderate)
        } else {
            None
        }
    }

    /// Correlate one covariate with one outcome.
    ///
    /// Returns `None` when fewer than the minimum number of days carry both
    /// values, when either series is constant, or when the association is weak.
    pub fn correlate(
        &self,
        vectors: &[FeatureVector],
        covariate: Covariate,
        outcome: Outcome,
    ) -> Option<CorrelationResult> {
        let (xs, ys): (Vec<f64>, Vec<f64>) = vectors
            .iter()
            .filter_map(|v| Some((v.value(covariate.feature())?, v.value(outcome.feature())?)))
            .unzip();

        if xs.len() < self.config.min_samples {
            return None;
        }

        let coefficient = stats::pearson(&xs, &ys)?;
        let strength = self.classify(coefficient)?;
        let direction = if coefficient >= 0.0 {
            CorrelationDirection::Positive
        } else {
            CorrelationDirection::Negative
        };

        Some(CorrelationResult {
            covariate,
            outcome,
            coefficient,
            sample_size: xs.len(),
            strength,
            direction,
        })
    }

    /// Every reportable pair, strongest first.
    ///
    /// Returns `None` when the window is too short for any pair to qualify.
    pub fn analyze(&self, vectors: &[FeatureVector]) -> Option<Vec<CorrelationResult>> {
        if vectors.len() < self.config.min_samples {
            debug!(
                days = vectors.len(),
                min_samples = self.config.min_samples,
                "correlation stage skipped"
            );
            return None;
        }

        let mut results: Vec<CorrelationResult> = Covariate::ALL
            .iter()
            .flat_map(|&covariate| {
                Outcome::ALL
                    .iter()
                    .filter_map(move |&outcome| self.correlate(vectors, covariate, outcome))
            })
            .collect();

        results.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));

        debug!(pairs = results.len(), "correlation stage complete");
        Some(results)
    }
}
