//! UMAP - Uniform Manifold Approximation and Projection
//!
//! Implements the UMAP algorithm (McInnes et al., 2018) with:
//! - Parallel KNN graph construction via rayon
//! - Fuzzy simplicial set with binary-search sigma
//! - SGD layout optimization with negative sampling
//!
//! Edges are kept in ordered maps so a fixed seed reproduces the layout
//! bit for bit.

use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::config::UmapConfig;
use crate::error::{BoundaryError, Result};

/// Number of negative samples per positive edge
const NEGATIVE_SAMPLE_RATE: usize = 5;

/// Per-coordinate gradient clip
const GRADIENT_CLIP: f64 = 4.0;

/// A neighbor entry for the heap (max-heap by distance for eviction)
#[derive(Clone)]
struct Neighbor {
    index: usize,
    distance: f64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        // Farthest first, ties broken by index so eviction is deterministic
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// An edge in the fuzzy simplicial set
struct Edge {
    i: usize,
    j: usize,
    weight: f64,
}

/// UMAP dimensionality reduction
pub struct Umap {
    config: UmapConfig,
    n_components: usize,
    seed: u64,
}

impl Umap {
    /// Create a new UMAP instance from an already resolved configuration
    pub fn new(config: UmapConfig, n_components: usize, seed: u64) -> Self {
        Self {
            config,
            n_components,
            seed,
        }
    }

    /// Embed the rows of `x` (n x d) into n x `n_components`
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n < 3 {
            return Err(BoundaryError::DataError(
                "UMAP requires at least 3 samples".to_string(),
            ));
        }

        let k = self.config.n_neighbors.min(n - 1);

        // Phase 1: KNN graph
        let (knn_indices, knn_distances) = self.compute_knn(x, k);

        // Phase 2: Fuzzy simplicial set
        let edges = self.compute_fuzzy_set(&knn_indices, &knn_distances, k);

        // Phase 3: SGD layout optimization
        Ok(self.optimize_layout(n, &edges))
    }

    /// Phase 1: brute-force k-nearest neighbors under the configured metric.
    /// Parallelized over samples with rayon.
    fn compute_knn(&self, x: &Array2<f64>, k: usize) -> (Vec<Vec<usize>>, Vec<Vec<f64>>) {
        let n = x.nrows();
        let metric = self.config.metric;

        let results: Vec<(Vec<usize>, Vec<f64>)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
                let xi = x.row(i);

                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let candidate = Neighbor {
                        index: j,
                        distance: metric.distance(xi, x.row(j)),
                    };

                    if heap.len() < k {
                        heap.push(candidate);
                    } else if let Some(top) = heap.peek() {
                        if candidate < *top {
                            heap.pop();
                            heap.push(candidate);
                        }
                    }
                }

                let neighbors = heap.into_sorted_vec();
                let indices: Vec<usize> = neighbors.iter().map(|n| n.index).collect();
                let distances: Vec<f64> = neighbors.iter().map(|n| n.distance).collect();
                (indices, distances)
            })
            .collect();

        results.into_iter().unzip()
    }

    /// Phase 2: Compute fuzzy simplicial set (edge weights).
    /// For each point, find rho (nearest neighbor distance) and sigma
    /// (smooth normalization via binary search), then symmetrize.
    fn compute_fuzzy_set(
        &self,
        knn_indices: &[Vec<usize>],
        knn_distances: &[Vec<f64>],
        k: usize,
    ) -> Vec<Edge> {
        let n = knn_indices.len();
        let target = (k as f64).log2();

        let params: Vec<(f64, f64)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let dists = &knn_distances[i];
                let rho = dists.first().copied().unwrap_or(0.0).max(1e-12);

                // Binary search for sigma
                let mut lo = 1e-8_f64;
                let mut hi = 1000.0_f64;
                let mut sigma = 1.0;

                for _ in 0..64 {
                    sigma = (lo + hi) / 2.0;
                    let sum: f64 = dists
                        .iter()
                        .map(|&d| (-(d - rho).max(0.0) / sigma).exp())
                        .sum();

                    if (sum - target).abs() < 1e-5 {
                        break;
                    }
                    if sum > target {
                        hi = sigma;
                    } else {
                        lo = sigma;
                    }
                }

                (rho, sigma)
            })
            .collect();

        let mut directed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for i in 0..n {
            let (rho, sigma) = params[i];
            for (rank, (&j, &d)) in knn_indices[i].iter().zip(knn_distances[i].iter()).enumerate() {
                let w = if rank == 0 {
                    1.0 // nearest neighbor always has weight 1
                } else {
                    (-(d - rho).max(0.0) / sigma.max(1e-12)).exp()
                };
                directed.insert((i, j), w);
            }
        }

        // Symmetrize: w_sym(i,j) = w(i,j) + w(j,i) - w(i,j) * w(j,i)
        let mut symmetric: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (&(i, j), &w_ij) in &directed {
            let key = if i < j { (i, j) } else { (j, i) };
            let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
            let w_sym = w_ij + w_ji - w_ij * w_ji;
            symmetric
                .entry(key)
                .and_modify(|w| *w = w.max(w_sym))
                .or_insert(w_sym);
        }

        symmetric
            .into_iter()
            .filter(|(_, w)| *w > 1e-8)
            .map(|((i, j), weight)| Edge { i, j, weight })
            .collect()
    }

    /// Phase 3: SGD layout optimization with negative sampling.
    fn optimize_layout(&self, n_samples: usize, edges: &[Edge]) -> Array2<f64> {
        let dims = self.n_components;
        let (a, b) = find_ab_params(self.config.spread, self.config.min_dist);

        // Initialize embedding with small random values
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut embedding =
            Array2::from_shape_fn((n_samples, dims), |_| rng.gen_range(-10.0..10.0) * 0.01);

        let n_epochs = self.config.n_epochs;
        let max_weight = edges.iter().map(|e| e.weight).fold(0.0_f64, f64::max);
        let mut dy = vec![0.0; dims];

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
            if alpha < 1e-8 {
                break;
            }

            for edge in edges {
                // Higher weight = sampled more often
                let epochs_per_sample = if edge.weight > 0.0 {
                    max_weight / edge.weight
                } else {
                    f64::INFINITY
                };
                if epoch as f64 % epochs_per_sample.max(1.0) >= 1.0 {
                    continue;
                }

                let (i, j) = (edge.i, edge.j);

                // Attractive force
                let mut dist_sq: f64 = 1e-8;
                for c in 0..dims {
                    dy[c] = embedding[[i, c]] - embedding[[j, c]];
                    dist_sq += dy[c] * dy[c];
                }
                let grad_coeff =
                    -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
                for c in 0..dims {
                    let g = (grad_coeff * dy[c]).clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                    embedding[[i, c]] += alpha * g;
                    embedding[[j, c]] -= alpha * g;
                }

                // Negative sampling (repulsive forces)
                for _ in 0..NEGATIVE_SAMPLE_RATE {
                    let other = rng.gen_range(0..n_samples);
                    if other == i {
                        continue;
                    }

                    let mut dist_sq_neg: f64 = 1e-8;
                    for c in 0..dims {
                        dy[c] = embedding[[i, c]] - embedding[[other, c]];
                        dist_sq_neg += dy[c] * dy[c];
                    }
                    let grad_coeff_neg =
                        2.0 * b / ((0.001 + dist_sq_neg) * (1.0 + a * dist_sq_neg.powf(b)));
                    for c in 0..dims {
                        let g = (grad_coeff_neg * dy[c]).clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                        embedding[[i, c]] += alpha * g;
                    }
                }
            }
        }

        embedding
    }
}

/// Fit `a`, `b` of the output kernel `1 / (1 + a * d^(2b))` to the target
/// curve that is flat up to `min_dist` and decays with `spread` after it.
///
/// Least squares over 300 samples of `[0, 3 * spread]`, minimized with a
/// pattern search on `(ln a, b)`.
fn find_ab_params(spread: f64, min_dist: f64) -> (f64, f64) {
    let xs: Vec<f64> = (0..300).map(|i| 3.0 * spread * i as f64 / 299.0).collect();
    let targets: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let loss = |log_a: f64, b: f64| -> f64 {
        let a = log_a.exp();
        xs.iter()
            .zip(targets.iter())
            .map(|(&x, &t)| {
                let f = 1.0 / (1.0 + a * x.powf(2.0 * b));
                (f - t) * (f - t)
            })
            .sum()
    };

    let (mut log_a, mut b) = (0.0_f64, 1.0_f64);
    let mut best = loss(log_a, b);
    let mut step = 0.5;

    while step > 1e-7 {
        let mut improved = false;
        for (da, db) in [(step, 0.0), (-step, 0.0), (0.0, step), (0.0, -step)] {
            let (na, nb) = (log_a + da, b + db);
            if nb <= 0.05 {
                continue;
            }
            let candidate = loss(na, nb);
            if candidate < best {
                best = candidate;
                log_a = na;
                b = nb;
                improved = true;
            }
        }
        if !improved {
            step /= 2.0;
        }
    }

    (log_a.exp(), b)
}
