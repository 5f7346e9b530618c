//! MDS - Multidimensional Scaling via SMACOF
//!
//! Metric mode fits embedding distances to the dissimilarities directly.
//! Non-metric mode fits them to a monotone transform of the dissimilarities,
//! re-estimated every iteration with pool-adjacent-violators.

use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::config::{Dissimilarity, MdsConfig};
use crate::error::{BoundaryError, Result};
use crate::utils::DistanceMetric;

/// MDS dimensionality reduction
pub struct Mds {
    config: MdsConfig,
    n_components: usize,
    seed: u64,
}

impl Mds {
    /// Create a new MDS instance from an already resolved configuration
    pub fn new(config: MdsConfig, n_components: usize, seed: u64) -> Self {
        Self {
            config,
            n_components,
            seed,
        }
    }

    /// Embed into n x `n_components`. With `dissimilarity = precomputed`,
    /// `x` must be a symmetric non-negative n x n matrix.
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n < 2 {
            return Err(BoundaryError::DataError(
                "MDS requires at least 2 samples".to_string(),
            ));
        }

        let dissimilarities = match self.config.dissimilarity {
            Dissimilarity::Euclidean => DistanceMetric::Euclidean.pairwise(x),
            Dissimilarity::Precomputed => {
                validate_precomputed(x)?;
                x.clone()
            }
        };

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<(Array2<f64>, f64)> = None;

        for run in 0..self.config.n_init {
            let (embedding, stress) = self.smacof(&dissimilarities, &mut rng);
            debug!(run, stress, "SMACOF restart finished");
            if best.as_ref().map_or(true, |(_, s)| stress < *s) {
                best = Some((embedding, stress));
            }
        }

        best.map(|(embedding, _)| embedding)
            .ok_or_else(|| BoundaryError::Computation("MDS ran no restarts".to_string()))
    }

    /// One SMACOF run from a uniform random start. Returns the embedding
    /// and its raw stress.
    fn smacof(&self, dissimilarities: &Array2<f64>, rng: &mut ChaCha8Rng) -> (Array2<f64>, f64) {
        let n = dissimilarities.nrows();
        let k = self.n_components;

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();

        // Pair order by ascending dissimilarity, for the monotone fit
        let mut order: Vec<usize> = (0..pairs.len()).collect();
        order.sort_by(|&a, &b| {
            let (ai, aj) = pairs[a];
            let (bi, bj) = pairs[b];
            dissimilarities[[ai, aj]].total_cmp(&dissimilarities[[bi, bj]])
        });

        let mut x = Array2::from_shape_fn((n, k), |_| rng.gen::<f64>());
        let mut disparities = dissimilarities.clone();
        let mut old_stress: Option<f64> = None;
        let mut stress = 0.0_f64;

        for _iter in 0..self.config.max_iter {
            let distances = DistanceMetric::Euclidean.pairwise(&x);

            if !self.config.metric {
                let sorted: Vec<f64> = order
                    .iter()
                    .map(|&p| {
                        let (i, j) = pairs[p];
                        distances[[i, j]]
                    })
                    .collect();
                let fitted = pool_adjacent_violators(&sorted);

                let total: f64 = fitted.iter().map(|v| v * v).sum();
                let norm = if total > 0.0 {
                    (pairs.len() as f64 / total).sqrt()
                } else {
                    1.0
                };
                for (&p, &value) in order.iter().zip(fitted.iter()) {
                    let (i, j) = pairs[p];
                    disparities[[i, j]] = value * norm;
                    disparities[[j, i]] = value * norm;
                }
            }

            stress = pairs
                .iter()
                .map(|&(i, j)| {
                    let r = distances[[i, j]] - disparities[[i, j]];
                    r * r
                })
                .sum();

            // Guttman transform: X <- B(X) X / n
            let mut b = Array2::<f64>::zeros((n, n));
            for &(i, j) in &pairs {
                let d = distances[[i, j]];
                let ratio = if d > 0.0 { disparities[[i, j]] / d } else { 0.0 };
                b[[i, j]] = -ratio;
                b[[j, i]] = -ratio;
                b[[i, i]] += ratio;
                b[[j, j]] += ratio;
            }
            x = b.dot(&x) / n as f64;

            let scale = x.iter().map(|v| v * v).sum::<f64>().sqrt().max(1e-12);
            let relative = stress / scale;
            if let Some(previous) = old_stress {
                if previous - relative < self.config.eps {
                    break;
                }
            }
            old_stress = Some(relative);
        }

        (x, stress)
    }
}

fn validate_precomputed(x: &Array2<f64>) -> Result<()> {
    let n = x.nrows();
    if x.ncols() != n {
        return Err(BoundaryError::shape(
            format!("{n}x{n} dissimilarity matrix"),
            format!("{}x{}", x.nrows(), x.ncols()),
        ));
    }
    let scale = x.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
    for i in 0..n {
        for j in 0..n {
            let v = x[[i, j]];
            if v < 0.0 {
                return Err(BoundaryError::DataError(format!(
                    "negative dissimilarity at ({i}, {j})"
                )));
            }
            if (v - x[[j, i]]).abs() > 1e-8 * scale {
                return Err(BoundaryError::DataError(format!(
                    "dissimilarity matrix is not symmetric at ({i}, {j})"
                )));
            }
        }
    }
    Ok(())
}

/// Least-squares non-decreasing fit of `y` (unit weights)
fn pool_adjacent_violators(y: &[f64]) -> Vec<f64> {
    // Each block: (mean, size)
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(y.len());
    for &value in y {
        blocks.push((value, 1));
        while blocks.len() > 1 {
            let (last_mean, last_size) = blocks[blocks.len() - 1];
            let (prev_mean, prev_size) = blocks[blocks.len() - 2];
            if prev_mean <= last_mean {
                break;
            }
            let size = prev_size + last_size;
            let mean = (prev_mean * prev_size as f64 + last_mean * last_size as f64) / size as f64;
            blocks.pop();
            if let Some(top) = blocks.last_mut() {
                *top = (mean, size);
            }
        }
    }

    blocks
        .into_iter()
        .flat_map(|(mean, size)| std::iter::repeat(mean).take(size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn square() -> Array2<f64> {
        array![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.5, 0.5]]
    }

    #[test]
    fn test_pava() {
        assert_eq!(pool_adjacent_violators(&[1.0, 3.0, 2.0, 4.0]), vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(pool_adjacent_violators(&[3.0, 2.0, 1.0]), vec![2.0, 2.0, 2.0]);
        assert!(pool_adjacent_violators(&[]).is_empty());
    }

    #[test]
    fn test_metric_mds_preserves_distances() {
        let config = MdsConfig { eps: 1e-9, max_iter: 1000, ..Default::default() };
        let x = square();
        let y = Mds::new(config, 2, 42).fit_transform(&x).unwrap();

        let original = DistanceMetric::Euclidean.pairwise(&x);
        let embedded = DistanceMetric::Euclidean.pairwise(&y);
        for (a, b) in original.iter().zip(embedded.iter()) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }

    #[test]
    fn test_nonmetric_mds_runs() {
        let config = MdsConfig { metric: false, ..Default::default() };
        let y = Mds::new(config, 2, 42).fit_transform(&square()).unwrap();
        assert_eq!(y.dim(), (5, 2));
        assert!(y.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_precomputed_dissimilarity() {
        let d = DistanceMetric::Euclidean.pairwise(&square());
        let config = MdsConfig {
            dissimilarity: Dissimilarity::Precomputed,
            ..Default::default()
        };
        let y = Mds::new(config, 2, 42).fit_transform(&d).unwrap();
        assert_eq!(y.dim(), (5, 2));
    }

    #[test]
    fn test_precomputed_rejects_rectangular() {
        let config = MdsConfig {
            dissimilarity: Dissimilarity::Precomputed,
            ..Default::default()
        };
        let err = Mds::new(config, 2, 42).fit_transform(&square()).unwrap_err();
        assert!(matches!(err, BoundaryError::ShapeError { .. }));
    }

    #[test]
    fn test_mds_deterministic() {
        let a = Mds::new(MdsConfig::default(), 2, 3).fit_transform(&square()).unwrap();
        let b = Mds::new(MdsConfig::default(), 2, 3).fit_transform(&square()).unwrap();
        assert_eq!(a, b);
    }
}
