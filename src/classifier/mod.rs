//! Classifier seam
//!
//! The engine never trains models. It only needs something that maps
//! feature rows to integer class labels; any closure with the right
//! signature qualifies.

pub mod knn;

pub use knn::{KnnClassifier, WeightScheme};

use ndarray::{Array1, Array2};

use crate::error::Result;

/// A trained model queried for class labels.
///
/// `predict` must return exactly one label per input row. Implementations
/// are shared across threads and must not rely on interior mutation.
pub trait Classifier: Send + Sync {
    fn predict(&self, rows: &Array2<f64>) -> Result<Array1<i64>>;
}

impl<F> Classifier for F
where
    F: Fn(&Array2<f64>) -> Result<Array1<i64>> + Send + Sync,
{
    fn predict(&self, rows: &Array2<f64>) -> Result<Array1<i64>> {
        self(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoundaryError;
    use ndarray::array;

    #[test]
    fn test_closure_classifier() {
        let sign = |rows: &Array2<f64>| -> Result<Array1<i64>> {
            Ok(rows.column(0).mapv(|v| if v >= 0.0 { 1 } else { 0 }))
        };
        let labels = sign.predict(&array![[-1.0], [2.0]]).unwrap();
        assert_eq!(labels.to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_errors_propagate() {
        let failing = |_: &Array2<f64>| -> Result<Array1<i64>> {
            Err(BoundaryError::Prediction("model offline".to_string()))
        };
        let classifier: &dyn Classifier = &failing;
        assert!(matches!(
            classifier.predict(&array![[0.0]]),
            Err(BoundaryError::Prediction(_))
        ));
    }
}
