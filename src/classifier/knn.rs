//! K-Nearest Neighbors classifier
//!
//! Reference stand-in for an externally trained model: stores the rows it
//! is given and votes among the nearest of them.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::Classifier;
use crate::error::{BoundaryError, Result};
use crate::utils::DistanceMetric;

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl Default for WeightScheme {
    fn default() -> Self {
        Self::Uniform
    }
}

/// K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnClassifier {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<i64>>,
}

#[derive(Clone, Copy)]
struct Neighbor {
    distance: f64,
    index: usize,
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
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

impl KnnClassifier {
    /// Create with the given k, Euclidean metric and uniform weights
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
            x_train: None,
            y_train: None,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    /// Fit the classifier (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &[i64]) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(BoundaryError::shape(
                format!("{} labels", x.nrows()),
                format!("{} labels", y.len()),
            ));
        }
        if x.nrows() == 0 {
            return Err(BoundaryError::DataError(
                "cannot fit a classifier on zero rows".to_string(),
            ));
        }
        if self.n_neighbors == 0 {
            return Err(BoundaryError::invalid_parameter("n_neighbors", 0, "must be at least 1"));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(Array1::from_vec(y.to_vec()));
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    fn vote(&self, row: ArrayView1<f64>, x_train: &Array2<f64>, y_train: &Array1<i64>) -> i64 {
        let k = self.n_neighbors.min(x_train.nrows());
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for (index, train_row) in x_train.rows().into_iter().enumerate() {
            let candidate = Neighbor {
                distance: self.metric.distance(row, train_row),
                index,
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

        let mut tally: BTreeMap<i64, f64> = BTreeMap::new();
        for neighbor in heap.into_sorted_vec() {
            let weight = match self.weights {
                WeightScheme::Uniform => 1.0,
                WeightScheme::Distance => 1.0 / neighbor.distance.max(1e-12),
            };
            *tally.entry(y_train[neighbor.index]).or_insert(0.0) += weight;
        }

        // Highest score wins, ties go to the smallest label
        tally
            .into_iter()
            .fold(None, |best: Option<(i64, f64)>, (label, score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((label, score)),
            })
            .map(|(label, _)| label)
            .unwrap_or_default()
    }
}

impl Classifier for KnnClassifier {
    fn predict(&self, rows: &Array2<f64>) -> Result<Array1<i64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(BoundaryError::Prediction("classifier is not fitted".to_string())),
        };
        if rows.ncols() != x_train.ncols() {
            return Err(BoundaryError::shape(
                format!("{} features", x_train.ncols()),
                format!("{} features", rows.ncols()),
            ));
        }

        let predictions: Vec<i64> = (0..rows.nrows())
            .into_par_iter()
            .map(|i| self.vote(rows.row(i), x_train, y_train))
            .collect();
        Ok(Array1::from_vec(predictions))
    }
}
