//! Anomaly detection
//!
//! Fits an isolation forest over the window's feature matrix and scores every
//! day by how quickly random partitioning separates it from the other days.
//! The model is refit from scratch on each call and never leaves this module.

use crate::config::AnomalyConfig;
use crate::stats;
use crate::types::{AnomalyResult, Feature, FeatureDeviation, FeatureVector};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Euler-Mascheroni constant, used by the average path length estimate
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Deviations smaller than this are not reported as contributing
const MIN_REPORTED_Z: f64 = 1e-9;

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn grow(
        data: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        if depth >= height_limit || indices.len() <= 1 {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        // Only columns that still vary within this node can split it
        let dims = data[indices[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..dims)
            .filter_map(|f| {
                let (min, max) = indices
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                        (lo.min(data[i][f]), hi.max(data[i][f]))
                    });
                (max > min).then_some((f, min, max))
            })
            .collect();

        if candidates.is_empty() {
            return Node::Leaf {
                size: indices.len(),
            };
        }

        let (feature, min, max) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| data[i][feature] < threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::grow(data, left, depth + 1, height_limit, rng)),
            right: Box::new(Node::grow(data, right, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, point: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if point[*feature] < *threshold {
                    left.path_length(point, depth + 1)
                } else {
                    right.path_length(point, depth + 1)
                }
            }
        }
    }
}

/// Ensemble of random partitioning trees
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit on a row-major matrix. Returns `None` for fewer than two rows.
    pub fn fit(data: &[Vec<f64>], trees: usize, subsample_size: usize, seed: u64) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let sample_size = subsample_size.min(data.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let trees = (0..trees)
            .map(|_| {
                let sample = index::sample(&mut rng, data.len(), sample_size).into_vec();
                Node::grow(data, sample, 0, height_limit, &mut rng)
            })
            .collect();

        Some(Self { trees, sample_size })
    }

    /// Isolation score in (0, 1]; around 0.5 is ordinary, near 1 is isolated
    pub fn score(&self, point: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|t| t.path_length(point, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        2f64.powf(-mean_path / c).clamp(0.0, 1.0)
    }
}

/// Detector that flags unusual days against the user's own window
pub struct AnomalyDetector<'a> {
    config: &'a AnomalyConfig,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(config: &'a AnomalyConfig) -> Self {
        Self { config }
    }

    /// Columns fed to the forest. Weather joins only when every day has it.
    pub fn feature_columns(vectors: &[FeatureVector]) -> Vec<Feature> {
        let mut columns = Feature::BEHAVIORAL.to_vec();
        if !vectors.is_empty() && vectors.iter().all(|v| v.weather_temp.is_some()) {
            columns.push(Feature::WeatherTemp);
        }
        columns
    }

    /// Score every day in the window.
    ///
    /// Returns `None` when the window is shorter than the configured minimum;
    /// small samples produce no anomalies rather than unreliable ones.
    pub fn detect(&self, vectors: &[FeatureVector]) -> Option<Vec<AnomalyResult>> {
        if vectors.len() < self.config.min_days {
            debug!(
                days = vectors.len(),
                min_days = self.config.min_days,
                "anomaly stage skipped"
            );
            return None;
        }

        let columns = Self::feature_columns(vectors);
        let matrix: Vec<Vec<f64>> = vectors
            .iter()
            .map(|v| columns.iter().filter_map(|&f| v.value(f)).collect())
            .collect();

        let forest = IsolationForest::fit(
            &matrix,
            self.config.trees,
            self.config.subsample_size,
            self.config.seed,
        )?;

        let scores: Vec<f64> = matrix.iter().map(|row| forest.score(row)).collect();
        let threshold = stats::quantile(&scores, 1.0 - self.config.contamination)?;

        let column_stats: Vec<(f64, f64)> = (0..columns.len())
            .map(|c| {
                let col: Vec<f64> = matrix.iter().map(|row| row[c]).collect();
                (
                    stats::mean(&col).unwrap_or(0.0),
                    stats::std_dev(&col).unwrap_or(0.0),
                )
            })
            .collect();

        let results: Vec<AnomalyResult> = vectors
            .iter()
            .zip(matrix.iter().zip(&scores))
            .map(|(vector, (row, &score))| {
                let is_anomaly = score > threshold;
                let contributing_features = if is_anomaly {
                    self.contributing_features(&columns, row, &column_stats)
                } else {
                    Vec::new()
                };
                AnomalyResult {
                    date: vector.date,
                    is_anomaly,
                    score,
                    contributing_features,
                }
            })
            .collect();

        debug!(
            days = results.len(),
            flagged = results.iter().filter(|r| r.is_anomaly).count(),
            threshold,
            "anomaly stage complete"
        );
        Some(results)
    }

    /// Features ranked by absolute standardized deviation from the window mean
    fn contributing_features(
        &self,
        columns: &[Feature],
        row: &[f64],
        column_stats: &[(f64, f64)],
    ) -> Vec<FeatureDeviation> {
        let mut deviations: Vec<FeatureDeviation> = columns
            .iter()
            .zip(row)
            .zip(column_stats)
            .filter(|(_, column)| column.1 > 0.0)
            .map(|((&feature, &value), &(mean, std))| FeatureDeviation {
                feature,
                value,
                z_score: (value - mean) / std,
            })
            .filter(|d| d.z_score.abs() > MIN_REPORTED_Z)
            .collect();

        deviations.sort_by(|a, b| b.z_score.abs().total_cmp(&a.z_score.abs()));
        deviations.truncate(self.config.top_features);
        deviations
    }
}
