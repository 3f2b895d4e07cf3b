//! Mood trend analysis
//!
//! Fits a least-squares line to the mood series over a short and a long window,
//! both ending at the most recent logged day. Slopes inside the deadband are
//! reported as stable. The deadband widens with the slope's standard error so a
//! noisy week does not read as a trend.

use crate::config::TrendConfig;
use crate::stats;
use crate::types::{FeatureVector, TrendDirection, TrendResult, TrendWindow};
use chrono::Duration;
use tracing::debug;

/// Analyzer for short- and long-window mood trajectories
pub struct TrendAnalyzer<'a> {
    config: &'a TrendConfig,
}

impl<'a> TrendAnalyzer<'a> {
    pub fn new(config: &'a TrendConfig) -> Self {
        Self { config }
    }

    /// Trend results for each window that has enough samples.
    ///
    /// Returns `None` when neither window qualifies.
    pub fn analyze(&self, vectors: &[FeatureVector]) -> Option<Vec<TrendResult>> {
        let results: Vec<TrendResult> = [
            (
                TrendWindow::Short,
                self.config.short_window_days,
                self.config.short_min_samples,
            ),
            (
                TrendWindow::Long,
                self.config.long_window_days,
                self.config.long_min_samples,
            ),
        ]
        .into_iter()
        .filter_map(|(window, days, min_samples)| {
            self.analyze_window(vectors, window, days, min_samples)
        })
        .collect();

        debug!(windows = results.len(), "trend stage complete");
        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }

    fn analyze_window(
        &self,
        vectors: &[FeatureVector],
        window: TrendWindow,
        window_days: u32,
        min_samples: usize,
    ) -> Option<TrendResult> {
        let last = vectors.last()?.date;
        let start = last - Duration::days(window_days as i64 - 1);

        let (xs, ys): (Vec<f64>, Vec<f64>) = vectors
            .iter()
            .filter(|v| v.date >= start)
            .map(|v| ((v.date - start).num_days() as f64, v.mood))
            .unzip();

        if xs.len() < min_samples {
            debug!(
                ?window,
                samples = xs.len(),
                min_samples,
                "trend window skipped"
            );
            return None;
        }

        let fit = stats::linear_fit(&xs, &ys)?;
        let deadband = self
            .config
            .min_slope
            .max(self.config.noise_multiplier * fit.slope_std_err);

        let direction = if fit.slope.abs() <= deadband {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Improving
        } else {
            TrendDirection::Declining
        };

        let coverage = (xs.len() as f64 / window_days as f64).min(1.0);
        let fit_agreement = match (fit.r_squared, direction) {
            (None, _) => 1.0,
            (Some(r2), TrendDirection::Stable) => 1.0 - r2,
            (Some(r2), _) => r2,
        };

        Some(TrendResult {
            window,
            window_days,
            direction,
            magnitude: fit.slope,
            confidence: (coverage * fit_agreement).clamp(0.0, 1.0),
            sample_count: xs.len(),
        })
    }
}
