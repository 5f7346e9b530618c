//! t-SNE - t-distributed Stochastic Neighbor Embedding
//!
//! Exact O(n²) variant: Gaussian input affinities calibrated per point to
//! the requested perplexity, Student-t output affinities, and gradient
//! descent with momentum and per-coordinate gains.

use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::config::{PcaConfig, SvdSolver, TsneConfig, TsneInit};
use super::pca::Pca;
use crate::error::{BoundaryError, Result};
use crate::utils::{DistanceMetric, VectorOps};

/// Iterations run with early exaggeration
const EXPLORATION_ITER: usize = 250;

/// Binary search steps per point when calibrating affinities
const PERPLEXITY_STEPS: usize = 100;

const PERPLEXITY_TOL: f64 = 1e-5;
const MIN_GAIN: f64 = 0.01;
const MACHINE_EPSILON: f64 = 1e-12;

/// t-SNE dimensionality reduction
pub struct Tsne {
    config: TsneConfig,
    n_components: usize,
    seed: u64,
}

impl Tsne {
    /// Create a new t-SNE instance from an already resolved configuration
    pub fn new(config: TsneConfig, n_components: usize, seed: u64) -> Self {
        Self {
            config,
            n_components,
            seed,
        }
    }

    /// Embed the rows of `x` (n x d) into n x `n_components`
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n < 2 {
            return Err(BoundaryError::DataError(
                "t-SNE requires at least 2 samples".to_string(),
            ));
        }

        let p = self.joint_probabilities(x)?;
        let mut y = self.initial_embedding(x)?;
        self.optimize(&p, &mut y);
        Ok(y)
    }

    /// Symmetric joint probabilities P (n x n) from per-point conditionals
    fn joint_probabilities(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        let mut distances = self.config.metric.pairwise(x);
        if self.config.metric == DistanceMetric::Euclidean {
            distances.mapv_inplace(|d| d * d);
        }

        let target_entropy = self.config.perplexity.ln();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| conditional_row(distances.row(i).as_slice(), i, target_entropy))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                BoundaryError::Computation("non-contiguous distance matrix".to_string())
            })?;

        let mut p = Array2::zeros((n, n));
        let denom = 2.0 * n as f64;
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    p[[i, j]] = ((rows[i][j] + rows[j][i]) / denom).max(MACHINE_EPSILON);
                }
            }
        }
        Ok(p)
    }

    fn initial_embedding(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        let k = self.n_components;

        match self.config.init {
            TsneInit::Pca => {
                let pca_config = PcaConfig {
                    svd_solver: SvdSolver::Full,
                    ..Default::default()
                };
                let (_, projected) = Pca::new(pca_config, k, self.seed).fit_transform(x)?;
                let std = VectorOps::variance(projected.column(0)).sqrt();
                let scale = if std > 0.0 { 1e-4 / std } else { 1.0 };
                Ok(projected * scale)
            }
            TsneInit::Random => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                Ok(Array2::from_shape_fn((n, k), |_| 1e-4 * standard_normal(&mut rng)))
            }
        }
    }

    fn optimize(&self, p: &Array2<f64>, y: &mut Array2<f64>) {
        let n = y.nrows();
        let k = y.ncols();
        let learning_rate = self.config.effective_learning_rate(n);
        let exploration = EXPLORATION_ITER.min(self.config.n_iter);

        let mut update = Array2::<f64>::zeros((n, k));
        let mut gains = Array2::<f64>::ones((n, k));

        for iter in 0..self.config.n_iter {
            let (exaggeration, momentum) = if iter < exploration {
                (self.config.early_exaggeration, 0.5)
            } else {
                (1.0, 0.8)
            };

            let grad = gradient(p, y, exaggeration);

            for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
                *gain = if g * *u < 0.0 {
                    *gain + 0.2
                } else {
                    *gain * 0.8
                };
                *gain = gain.max(MIN_GAIN);
                *u = momentum * *u - learning_rate * *gain * g;
            }
            *y += &update;
        }
    }
}

/// Conditional probabilities p(j|i) for row `i`, with the Gaussian precision
/// found by bisection so the row entropy matches `target_entropy`.
///
/// Distances are shifted by the row minimum before exponentiation; the
/// normalized row is invariant to the shift.
fn conditional_row(distances: Option<&[f64]>, i: usize, target_entropy: f64) -> Option<Vec<f64>> {
    let distances = distances?;
    let n = distances.len();
    let floor = distances
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &d)| d)
        .fold(f64::INFINITY, f64::min);
    let floor = if floor.is_finite() { floor } else { 0.0 };

    let mut beta = 1.0_f64;
    let mut beta_lo = 0.0_f64;
    let mut beta_hi = f64::INFINITY;
    let mut row = vec![0.0; n];

    for _ in 0..PERPLEXITY_STEPS {
        let mut sum = 0.0_f64;
        let mut weighted = 0.0_f64;
        for j in 0..n {
            if j == i {
                row[j] = 0.0;
                continue;
            }
            let shifted = distances[j] - floor;
            let pj = (-shifted * beta).exp();
            row[j] = pj;
            sum += pj;
            weighted += shifted * pj;
        }
        let sum = sum.max(MACHINE_EPSILON);
        let entropy = sum.ln() + beta * weighted / sum;

        for v in row.iter_mut() {
            *v /= sum;
        }

        let diff = entropy - target_entropy;
        if diff.abs() <= PERPLEXITY_TOL {
            break;
        }
        if diff > 0.0 {
            beta_lo = beta;
            beta = if beta_hi.is_finite() { (beta + beta_hi) / 2.0 } else { beta * 2.0 };
        } else {
            beta_hi = beta;
            beta = (beta + beta_lo) / 2.0;
        }
    }

    Some(row)
}

/// KL-divergence gradient for embedding `y` under joint probabilities `p`
fn gradient(p: &Array2<f64>, y: &Array2<f64>, exaggeration: f64) -> Array2<f64> {
    let n = y.nrows();
    let k = y.ncols();

    // Student-t kernel numerators, row sums gathered in row order
    let num_rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let yi = y.row(i);
            (0..n)
                .map(|j| {
                    if i == j {
                        return 0.0;
                    }
                    let d2: f64 = yi
                        .iter()
                        .zip(y.row(j).iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    1.0 / (1.0 + d2)
                })
                .collect()
        })
        .collect();
    let z: f64 = num_rows
        .iter()
        .map(|row| row.iter().sum::<f64>())
        .sum::<f64>()
        .max(MACHINE_EPSILON);

    let grad_rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut g = vec![0.0; k];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let num = num_rows[i][j];
                let coeff = (exaggeration * p[[i, j]] - num / z) * num;
                for c in 0..k {
                    g[c] += 4.0 * coeff * (y[[i, c]] - y[[j, c]]);
                }
            }
            g
        })
        .collect();

    let mut grad = Array2::zeros((n, k));
    for (i, row) in grad_rows.into_iter().enumerate() {
        for (c, v) in row.into_iter().enumerate() {
            grad[[i, c]] = v;
        }
    }
    grad
}

/// Standard normal sample (Box-Muller)
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
