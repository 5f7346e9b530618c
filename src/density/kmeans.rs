//! K-Means clustering with k-means++ initialization
//!
//! Used by the density filter to find representative positions in a
//! crowded class.

use ndarray::{Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{BoundaryError, Result};
use crate::utils::VectorOps;

/// K-Means clustering with k-means++ initialization and seeded restarts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    /// Independent k-means++ starts; the lowest-inertia run is kept
    pub n_init: usize,
    pub tol: f64,
    pub random_state: u64,
    /// Fitted cluster centroids (n_clusters × n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster assigned to each training row
    labels: Option<Vec<usize>>,
    /// Sum of squared distances to nearest centroid
    inertia: Option<f64>,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 100,
            n_init: 3,
            tol: 1e-4,
            random_state: 42,
            centroids: None,
            labels: None,
            inertia: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        // Pick first centroid uniformly at random
        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        // Squared distance of every point to its nearest chosen centroid
        let mut nearest: Vec<f64> = (0..n_samples)
            .map(|i| VectorOps::squared_euclidean_distance(x.row(i), x.row(first)))
            .collect();

        for c in 1..k {
            // Weighted random selection proportional to D²
            let total: f64 = nearest.iter().sum();
            let chosen = if total <= 0.0 {
                rng.gen_range(0..n_samples)
            } else {
                let r = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                let mut chosen = n_samples - 1;
                for (i, &d) in nearest.iter().enumerate() {
                    cumulative += d;
                    if cumulative >= r {
                        chosen = i;
                        break;
                    }
                }
                chosen
            };
            centroids.row_mut(c).assign(&x.row(chosen));

            let added = x.row(chosen);
            nearest.par_iter_mut().enumerate().for_each(|(i, d)| {
                *d = d.min(VectorOps::squared_euclidean_distance(x.row(i), added));
            });
        }

        centroids
    }

    fn closest(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
        let mut best_c = 0;
        let mut best_dist = f64::MAX;
        for (c, centroid) in centroids.rows().into_iter().enumerate() {
            let d = VectorOps::squared_euclidean_distance(row, centroid);
            if d < best_dist {
                best_dist = d;
                best_c = c;
            }
        }
        (best_c, best_dist)
    }

    /// One Lloyd run from a k-means++ start
    fn single_run(&self, x: &Array2<f64>, rng: &mut ChaCha8Rng) -> (Array2<f64>, Vec<usize>, f64) {
        let n_samples = x.nrows();
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _iter in 0..self.max_iter {
            // Assignment step: assign each point to nearest centroid
            let new_labels: Vec<usize> = (0..n_samples)
                .into_par_iter()
                .map(|i| Self::closest(x.row(i), &centroids).0)
                .collect();

            let changed = new_labels.iter().zip(labels.iter()).filter(|(a, b)| a != b).count();
            labels = new_labels;

            // Update step: recompute centroids
            let mut new_centroids = Array2::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }
            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster, reinitialize randomly
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        // Final assignment against the final centroids
        let assigned: Vec<(usize, f64)> = (0..n_samples)
            .into_par_iter()
            .map(|i| Self::closest(x.row(i), &centroids))
            .collect();
        let inertia = assigned.iter().map(|&(_, d)| d).sum();
        let labels = assigned.into_iter().map(|(c, _)| c).collect();

        (centroids, labels, inertia)
    }

    /// Fit the model on the rows of `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if self.n_clusters == 0 {
            return Err(BoundaryError::invalid_parameter("n_clusters", 0, "must be at least 1"));
        }
        let n_samples = x.nrows();
        if n_samples < self.n_clusters {
            return Err(BoundaryError::DataError(format!(
                "n_samples ({}) < n_clusters ({})",
                n_samples, self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut best: Option<(Array2<f64>, Vec<usize>, f64)> = None;

        for _run in 0..self.n_init.max(1) {
            let run = self.single_run(x, &mut rng);
            if best.as_ref().map_or(true, |b| run.2 < b.2) {
                best = Some(run);
            }
        }

        if let Some((centroids, labels, inertia)) = best {
            self.centroids = Some(centroids);
            self.labels = Some(labels);
            self.inertia = Some(inertia);
        }
        Ok(self)
    }

    /// Nearest centroid for new rows
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let centroids = self.centroids.as_ref().ok_or_else(|| {
            BoundaryError::Computation("k-means model is not fitted".to_string())
        })?;
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|i| Self::closest(x.row(i), centroids).0)
            .collect())
    }

    /// Get cluster centroids
    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }

    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    pub fn inertia(&self) -> Option<f64> {
        self.inertia
    }
}
