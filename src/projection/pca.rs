//! PCA - Principal Component Analysis
//!
//! Linear reduction onto the top-k eigenvectors of the covariance matrix.
//! The fitted model keeps its components so that projected coordinates can
//! be mapped back into feature space.

use ndarray::{s, Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::config::{PcaConfig, SvdSolver};
use crate::error::{BoundaryError, Result};
use crate::utils::{SymmetricEigen, VectorOps};

/// Feature count above which `auto` switches to power iteration
const AUTO_EXACT_MAX_FEATURES: usize = 500;

/// Iteration ceiling for the `arpack` power iteration
const POWER_MAX_ITER: usize = 300;

/// PCA dimensionality reduction
pub struct Pca {
    config: PcaConfig,
    n_components: usize,
    seed: u64,
}

/// Fitted PCA model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaModel {
    /// Principal axes, one per row (k x d)
    components: Array2<f64>,
    /// Per-feature mean removed before projection
    mean: Array1<f64>,
    /// Variance along each component
    explained_variance: Array1<f64>,
    /// Share of the total variance along each component
    explained_variance_ratio: Array1<f64>,
    whiten: bool,
    /// Width of the projected output, may exceed the number of components
    n_output: usize,
}

impl Pca {
    /// Create a new PCA instance
    pub fn new(config: PcaConfig, n_components: usize, seed: u64) -> Self {
        Self {
            config,
            n_components,
            seed,
        }
    }

    /// Fit on `x` (n x d). At most `min(n_components, d)` axes are kept.
    pub fn fit(&self, x: &Array2<f64>) -> Result<PcaModel> {
        let n = x.nrows();
        let d = x.ncols();
        if n < 2 {
            return Err(BoundaryError::DataError(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d < 1 {
            return Err(BoundaryError::DataError(
                "PCA requires at least 1 feature".to_string(),
            ));
        }

        let k = self.n_components.min(d);

        let mean = VectorOps::column_means(x);
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let total_variance: f64 = cov.diag().sum().max(1e-12);

        let (eigenvalues, eigenvectors) = match self.config.svd_solver {
            SvdSolver::Full => self.exact(&cov, k)?,
            SvdSolver::Auto if d <= AUTO_EXACT_MAX_FEATURES => self.exact(&cov, k)?,
            SvdSolver::Auto | SvdSolver::Arpack => {
                self.power_iteration(&cov, k, POWER_MAX_ITER, self.config.tol)
            }
            SvdSolver::Randomized => {
                self.power_iteration(&cov, k, self.config.iterated_power, 0.0)
            }
        };

        let mut components = Array2::zeros((k, d));
        for (c, mut vector) in eigenvectors.into_iter().enumerate() {
            // Deterministic sign: the largest-magnitude loading is positive
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                vector.mapv_inplace(|v| -v);
            }
            components.row_mut(c).assign(&vector);
        }

        let explained_variance = Array1::from_vec(eigenvalues);
        let explained_variance_ratio = explained_variance.mapv(|ev| (ev / total_variance).max(0.0));

        Ok(PcaModel {
            components,
            mean,
            explained_variance,
            explained_variance_ratio,
            whiten: self.config.whiten,
            n_output: self.n_components,
        })
    }

    /// Fit and project in one step
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<(PcaModel, Array2<f64>)> {
        let model = self.fit(x)?;
        let projected = model.transform(x)?;
        Ok((model, projected))
    }

    /// Exact eigen-decomposition of the covariance matrix
    fn exact(&self, cov: &Array2<f64>, k: usize) -> Result<(Vec<f64>, Vec<Array1<f64>>)> {
        let eigen = SymmetricEigen::decompose(cov, 100, 1e-22)?;
        let values = eigen.values.iter().take(k).map(|&v| v.max(0.0)).collect();
        let vectors = (0..k).map(|c| eigen.vectors.column(c).to_owned()).collect();
        Ok((values, vectors))
    }

    /// Power iteration with deflation to extract top-k eigenvectors.
    /// A `tol` of zero runs exactly `max_iter` iterations per component.
    fn power_iteration(
        &self,
        cov: &Array2<f64>,
        k: usize,
        max_iter: usize,
        tol: f64,
    ) -> (Vec<f64>, Vec<Array1<f64>>) {
        let d = cov.nrows();
        let mut eigenvalues = Vec::with_capacity(k);
        let mut eigenvectors = Vec::with_capacity(k);

        // Work on a copy so we can deflate
        let mut work = cov.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        for _component in 0..k {
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = VectorOps::norm(v.view()).max(1e-12);
            v /= norm;

            let mut eigenvalue = 0.0f64;

            for _iter in 0..max_iter.max(1) {
                let w = work.dot(&v);
                let new_eigenvalue = VectorOps::dot(v.view(), w.view());

                let w_norm = VectorOps::norm(w.view());
                if w_norm < 1e-12 {
                    // Remaining spectrum is zero, any unit vector will do
                    eigenvalue = 0.0;
                    break;
                }
                let new_v = w / w_norm;

                let diff = VectorOps::euclidean_distance(v.view(), new_v.view());
                v = new_v;
                eigenvalue = new_eigenvalue;

                if tol > 0.0 && diff < tol {
                    break;
                }
            }

            eigenvalue = eigenvalue.max(0.0);

            // Deflate: A = A - eigenvalue * v * v^T
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }

            eigenvalues.push(eigenvalue);
            eigenvectors.push(v);
        }

        (eigenvalues, eigenvectors)
    }
}

impl PcaModel {
    /// Principal axes, one per row
    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn whitening_scale(&self) -> Array1<f64> {
        self.explained_variance.mapv(|ev| ev.max(1e-12).sqrt())
    }

    /// Project rows onto the principal axes. Output columns beyond the
    /// number of fitted axes are zero.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(BoundaryError::shape(
                format!("{} features", self.n_features()),
                format!("{} features", x.ncols()),
            ));
        }

        let k = self.components.nrows();
        let mut scores = (x - &self.mean).dot(&self.components.t());
        if self.whiten {
            scores /= &self.whitening_scale();
        }

        if self.n_output == k {
            return Ok(scores);
        }
        let mut out = Array2::zeros((x.nrows(), self.n_output));
        out.slice_mut(s![.., ..k]).assign(&scores);
        Ok(out)
    }

    /// Map projected rows back to feature space. Padding columns are ignored.
    pub fn inverse_transform(&self, coords: &Array2<f64>) -> Result<Array2<f64>> {
        if coords.ncols() != self.n_output {
            return Err(BoundaryError::shape(
                format!("{} columns", self.n_output),
                format!("{} columns", coords.ncols()),
            ));
        }

        let k = self.components.nrows();
        let mut scores = coords.slice(s![.., ..k]).to_owned();
        if self.whiten {
            scores *= &self.whitening_scale();
        }
        Ok(scores.dot(&self.components) + &self.mean)
    }
}
