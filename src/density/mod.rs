//! Density-aware point filtering
//!
//! Bounds the number of rendered points per class. A crowded class is
//! replaced by the real points nearest to k-means centroids fitted on a
//! seeded sample of that class.

pub mod kmeans;

pub use kmeans::KMeans;

use ndarray::{Array2, Axis};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{BoundaryError, Result};
use crate::utils::{Timer, VectorOps};

/// Points kept by the density filter, in ascending original-index order
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPoints {
    /// Projected coordinates of the kept points
    pub points: Array2<f64>,
    /// Original feature rows of the kept points
    pub rows: Array2<f64>,
    pub labels: Vec<i64>,
    /// Original index of every kept point
    pub indices: Vec<usize>,
}

impl FilteredPoints {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Per-class representative selection
#[derive(Debug, Clone)]
pub struct DensityFilter {
    /// Maximum points kept per class
    pub threshold: usize,
    /// The k-means sample holds `threshold * multiplier` points
    pub multiplier: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl Default for DensityFilter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DensityFilter {
    pub fn new(threshold: usize, multiplier: usize) -> Self {
        Self {
            threshold,
            multiplier,
            seed: 42,
            n_init: 3,
            max_iter: 100,
        }
    }

    /// Filter bounds, seed and k-means effort from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            threshold: config.density_threshold,
            multiplier: config.density_multiplier,
            seed: config.seed,
            n_init: config.kmeans_n_init,
            max_iter: config.kmeans_max_iter,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_kmeans(mut self, n_init: usize, max_iter: usize) -> Self {
        self.n_init = n_init;
        self.max_iter = max_iter;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(BoundaryError::invalid_parameter("threshold", 0, "must be at least 1"));
        }
        if self.multiplier == 0 {
            return Err(BoundaryError::invalid_parameter("multiplier", 0, "must be at least 1"));
        }
        Ok(())
    }

    /// Select at most `threshold` points per class.
    ///
    /// `points` are the projected coordinates used for clustering, `rows`
    /// the parallel original feature rows carried along unchanged.
    pub fn filter(&self, points: &Array2<f64>, rows: &Array2<f64>, labels: &[i64]) -> Result<FilteredPoints> {
        self.validate()?;
        let n = points.nrows();
        if rows.nrows() != n || labels.len() != n {
            return Err(BoundaryError::shape(
                format!("{n} rows and labels"),
                format!("{} rows, {} labels", rows.nrows(), labels.len()),
            ));
        }

        let timer = Timer::start();

        // Members of each class in ascending original index
        let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            classes.entry(label).or_default().push(i);
        }

        let mut selected = Vec::with_capacity(n.min(self.threshold * classes.len()));
        for (&label, members) in &classes {
            if members.len() <= self.threshold {
                selected.extend_from_slice(members);
                continue;
            }
            let kept = self.representatives(points, members)?;
            debug!(label, class_size = members.len(), kept = kept.len(), "class thinned");
            selected.extend(kept);
        }

        selected.sort_unstable();
        selected.dedup();

        debug!(
            input = n,
            output = selected.len(),
            elapsed_ms = timer.elapsed_ms(),
            "density filter applied"
        );

        Ok(FilteredPoints {
            points: points.select(Axis(0), &selected),
            rows: rows.select(Axis(0), &selected),
            labels: selected.iter().map(|&i| labels[i]).collect(),
            indices: selected,
        })
    }

    /// Original indices of the points nearest to each centroid of a class
    fn representatives(&self, points: &Array2<f64>, members: &[usize]) -> Result<Vec<usize>> {
        let class_points = points.select(Axis(0), members);
        let class_size = members.len();

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let sample_size = self.threshold.saturating_mul(self.multiplier).min(class_size);
        let mut sample: Vec<usize> = index::sample(&mut rng, class_size, sample_size).into_vec();
        sample.sort_unstable();
        let sample_points = class_points.select(Axis(0), &sample);

        let k = self.threshold.min(sample_size);
        let mut kmeans = KMeans::new(k)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
            .with_random_state(self.seed);
        kmeans.fit(&sample_points)?;

        let centroids = kmeans.centroids().ok_or_else(|| {
            BoundaryError::Computation("k-means produced no centroids".to_string())
        })?;

        // Nearest point from the whole class, not just the sample
        centroids
            .rows()
            .into_iter()
            .map(|centroid| {
                VectorOps::nearest_row(&class_points, centroid)
                    .map(|pos| members[pos])
                    .ok_or_else(|| BoundaryError::Computation("empty class".to_string()))
            })
            .collect()
    }
}

/// `filter(points, rows, labels, threshold, multiplier, seed)`
pub fn filter(
    points: &Array2<f64>,
    rows: &Array2<f64>,
    labels: &[i64],
    threshold: usize,
    multiplier: usize,
    seed: u64,
) -> Result<FilteredPoints> {
    DensityFilter::new(threshold, multiplier)
        .with_seed(seed)
        .filter(points, rows, labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(i, j)| {
            let t = i as f64 * 0.37;
            if j == 0 {
                t.sin() * (1.0 + (i % 7) as f64)
            } else {
                t.cos() * (1.0 + (i % 5) as f64)
            }
        })
    }

    #[test]
    fn test_small_classes_pass_through() {
        let points = cloud(6);
        let labels = vec![0, 1, 0, 1, 0, 1];
        let out = filter(&points, &points, &labels, 3, 2, 42).unwrap();
        assert_eq!(out.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(out.points, points);
    }

    #[test]
    fn test_crowded_class_bounded() {
        let points = cloud(60);
        let labels: Vec<i64> = (0..60).map(|i| if i < 50 { 7 } else { 3 }).collect();
        let out = DensityFilter::new(10, 2)
            .with_kmeans(1, 20)
            .filter(&points, &points, &labels)
            .unwrap();

        let sevens = out.labels.iter().filter(|&&l| l == 7).count();
        let threes = out.labels.iter().filter(|&&l| l == 3).count();
        assert!(sevens <= 10 && sevens > 0);
        assert_eq!(threes, 10);
        assert!(out.indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_rows_follow_points() {
        let points = cloud(30);
        let rows = Array2::from_shape_fn((30, 3), |(i, j)| (i * 10 + j) as f64);
        let labels = vec![1; 30];
        let out = filter(&points, &rows, &labels, 5, 3, 1).unwrap();
        for (pos, &idx) in out.indices.iter().enumerate() {
            assert_eq!(out.rows[[pos, 0]], (idx * 10) as f64);
            assert_eq!(out.points.row(pos), points.row(idx));
        }
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let points = cloud(4);
        assert!(matches!(
            filter(&points, &points, &[0, 0, 0, 0], 0, 5, 42),
            Err(BoundaryError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let points = cloud(4);
        assert!(matches!(
            filter(&points, &points, &[0, 0], 2, 5, 42),
            Err(BoundaryError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let points = Array2::zeros((0, 2));
        let out = filter(&points, &points, &[], 5, 5, 42).unwrap();
        assert!(out.is_empty());
    }
}
