//! Z-score standardization applied before every reducer

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{BoundaryError, Result};

/// Fitted per-feature standardizer: `(x - center) / scale`.
///
/// Scales use the population standard deviation. Constant features get a
/// scale of 1 so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    center: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    /// Fit on the rows of `x`
    pub fn fit(x: &Array2<f64>) -> Self {
        let d = x.ncols();
        if x.nrows() == 0 {
            return Self::identity(d);
        }

        let center = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > 1e-12 { s } else { 1.0 });

        Self { center, scale }
    }

    /// A standardizer that leaves data untouched
    pub fn identity(n_features: usize) -> Self {
        Self {
            center: Array1::zeros(n_features),
            scale: Array1::ones(n_features),
        }
    }

    /// Fit and transform in one step
    pub fn fit_transform(x: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(x);
        let scaled = (x - &scaler.center) / &scaler.scale;
        (scaler, scaled)
    }

    pub fn n_features(&self) -> usize {
        self.center.len()
    }

    pub fn center(&self) -> &Array1<f64> {
        &self.center
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Standardize rows with the fitted statistics
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        Ok((x - &self.center) / &self.scale)
    }

    /// Map standardized rows back to the original feature units
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        Ok(x * &self.scale + &self.center)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(BoundaryError::shape(
                format!("{} features", self.n_features()),
                format!("{} features", x.ncols()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardize_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let (_, scaled) = Standardizer::fit_transform(&x);
        for col in scaled.columns() {
            assert!(col.mean().unwrap().abs() < 1e-12);
            assert!((col.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_feature_maps_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0]];
        let (scaler, scaled) = Standardizer::fit_transform(&x);
        assert_eq!(scaler.scale()[0], 1.0);
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_inverse_restores_input() {
        let x = array![[1.0, -4.0], [3.0, 8.0], [7.0, 0.5]];
        let (scaler, scaled) = Standardizer::fit_transform(&x);
        let back = scaler.inverse_transform(&scaled).unwrap();
        for (a, b) in back.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = Standardizer::identity(3);
        assert!(scaler.transform(&array![[1.0, 2.0]]).is_err());
    }
}
