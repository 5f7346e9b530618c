//! Dense vector helpers shared by the reducers and the density filter.

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Scalar vector operations over ndarray views
pub struct VectorOps;

impl VectorOps {
    /// Sum of elements
    pub fn sum(data: ArrayView1<f64>) -> f64 {
        data.iter().sum()
    }

    /// Mean of elements (0 for an empty view)
    pub fn mean(data: ArrayView1<f64>) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        Self::sum(data) / data.len() as f64
    }

    /// Population variance (ddof = 0)
    pub fn variance(data: ArrayView1<f64>) -> f64 {
        if data.len() < 2 {
            return 0.0;
        }
        let mean = Self::mean(data);
        data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64
    }

    /// Dot product
    pub fn dot(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        debug_assert_eq!(a.len(), b.len(), "vectors must have the same length");
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    /// Squared Euclidean distance
    pub fn squared_euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        debug_assert_eq!(a.len(), b.len(), "vectors must have the same length");
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }

    /// Euclidean distance
    pub fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        Self::squared_euclidean_distance(a, b).sqrt()
    }

    /// L2 norm
    pub fn norm(a: ArrayView1<f64>) -> f64 {
        Self::dot(a, a).sqrt()
    }

    /// Column means of a row-major sample matrix
    pub fn column_means(x: &Array2<f64>) -> Array1<f64> {
        x.mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()))
    }

    /// Minimum and maximum of a column, `None` when the matrix has no rows
    pub fn column_range(x: &Array2<f64>, column: usize) -> Option<(f64, f64)> {
        x.column(column).iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Index of the row nearest to `target` (Euclidean); ties resolve to the lowest index
    pub fn nearest_row(x: &Array2<f64>, target: ArrayView1<f64>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, row) in x.rows().into_iter().enumerate() {
            let d = Self::squared_euclidean_distance(row, target);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }
}
