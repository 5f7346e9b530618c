//! Distance metrics accepted by the neighbourhood-based reducers

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::VectorOps;

/// Distance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Chebyshev distance (L-infinity)
    Chebyshev,
    /// Cosine dissimilarity (1 - cosine similarity)
    Cosine,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

impl DistanceMetric {
    /// Distance between two points
    pub fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => VectorOps::euclidean_distance(a, b),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Chebyshev => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            DistanceMetric::Cosine => {
                let denom = VectorOps::norm(a) * VectorOps::norm(b);
                if denom > 0.0 {
                    (1.0 - VectorOps::dot(a, b) / denom).max(0.0)
                } else {
                    1.0
                }
            }
        }
    }

    /// Full symmetric distance matrix (n x n), rows computed in parallel
    pub fn pairwise(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let xi = x.row(i);
                (0..n)
                    .map(|j| if i == j { 0.0 } else { self.distance(xi, x.row(j)) })
                    .collect()
            })
            .collect();

        let mut out = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, d) in row.into_iter().enumerate() {
                out[[i, j]] = d;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, -4.0];
        assert!((DistanceMetric::Euclidean.distance(a.view(), b.view()) - 5.0).abs() < 1e-12);
        assert!((DistanceMetric::Manhattan.distance(a.view(), b.view()) - 7.0).abs() < 1e-12);
        assert!((DistanceMetric::Chebyshev.distance(a.view(), b.view()) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_of_parallel_vectors_is_zero() {
        let a = array![1.0, 2.0];
        let b = array![2.0, 4.0];
        assert!(DistanceMetric::Cosine.distance(a.view(), b.view()).abs() < 1e-12);
    }

    #[test]
    fn test_pairwise_is_symmetric() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]];
        let d = DistanceMetric::Euclidean.pairwise(&x);
        for i in 0..3 {
            assert_eq!(d[[i, i]], 0.0);
            for j in 0..3 {
                assert!((d[[i, j]] - d[[j, i]]).abs() < 1e-12);
            }
        }
        assert!((d[[1, 2]] - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_metric_deserializes_lowercase() {
        let m: DistanceMetric = serde_json::from_str("\"manhattan\"").unwrap();
        assert_eq!(m, DistanceMetric::Manhattan);
    }
}
