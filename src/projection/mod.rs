//! Dimensionality reduction for visualization
//!
//! Every reducer runs on standardized features. The fitted projector keeps
//! the standardizer and, for PCA, the linear model, so projected mesh points
//! can be mapped back into the original feature space.

pub mod config;
pub mod mds;
pub mod pca;
pub mod scaler;
pub mod tsne;
pub mod umap;

pub use config::{
    Dissimilarity, LearningRate, MdsConfig, PcaConfig, SvdSolver, TsneConfig, TsneInit,
    UmapConfig,
};
pub use mds::Mds;
pub use pca::{Pca, PcaModel};
pub use scaler::Standardizer;
pub use tsne::Tsne;
pub use umap::Umap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{BoundaryError, Result};
use crate::utils::Timer;

/// Reduction method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMethod {
    Pca,
    Tsne,
    Umap,
    Mds,
}

impl ReductionMethod {
    pub const ALL: [ReductionMethod; 4] = [
        ReductionMethod::Pca,
        ReductionMethod::Tsne,
        ReductionMethod::Umap,
        ReductionMethod::Mds,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionMethod::Pca => "pca",
            ReductionMethod::Tsne => "tsne",
            ReductionMethod::Umap => "umap",
            ReductionMethod::Mds => "mds",
        }
    }

    /// Human-readable name for axis labels
    pub fn display_name(&self) -> &'static str {
        match self {
            ReductionMethod::Pca => "PCA",
            ReductionMethod::Tsne => "t-SNE",
            ReductionMethod::Umap => "UMAP",
            ReductionMethod::Mds => "MDS",
        }
    }

    /// Only linear reductions can map projected points back to features
    pub fn is_invertible(&self) -> bool {
        matches!(self, ReductionMethod::Pca)
    }
}

impl fmt::Display for ReductionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReductionMethod {
    type Err = BoundaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(ReductionMethod::Pca),
            "tsne" => Ok(ReductionMethod::Tsne),
            "umap" => Ok(ReductionMethod::Umap),
            "mds" => Ok(ReductionMethod::Mds),
            _ => Err(BoundaryError::InvalidMethod(s.to_string())),
        }
    }
}

/// Method together with its typed parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "parameters", rename_all = "lowercase")]
pub enum ReductionConfig {
    Pca(PcaConfig),
    Tsne(TsneConfig),
    Umap(UmapConfig),
    Mds(MdsConfig),
}

impl Default for ReductionConfig {
    fn default() -> Self {
        ReductionConfig::Pca(PcaConfig::default())
    }
}

impl From<ReductionMethod> for ReductionConfig {
    fn from(method: ReductionMethod) -> Self {
        match method {
            ReductionMethod::Pca => ReductionConfig::Pca(PcaConfig::default()),
            ReductionMethod::Tsne => ReductionConfig::Tsne(TsneConfig::default()),
            ReductionMethod::Umap => ReductionConfig::Umap(UmapConfig::default()),
            ReductionMethod::Mds => ReductionConfig::Mds(MdsConfig::default()),
        }
    }
}

impl ReductionConfig {
    /// Build a config from a method name and an optional parameter bag.
    ///
    /// Only the method's allow-listed keys are read; anything else in the
    /// bag is ignored. `null` or a missing bag yields the defaults. A
    /// value of the wrong type for an allow-listed key is `InvalidParameter`.
    pub fn from_parameters(method: &str, parameters: Option<&serde_json::Value>) -> Result<Self> {
        let method: ReductionMethod = method.parse()?;
        let parameters = match parameters {
            None | Some(serde_json::Value::Null) => return Ok(method.into()),
            Some(value @ serde_json::Value::Object(_)) => value.clone(),
            Some(other) => {
                return Err(BoundaryError::invalid_parameter(
                    "parameters",
                    other,
                    "must be a JSON object",
                ))
            }
        };

        let invalid = |e: serde_json::Error| {
            BoundaryError::invalid_parameter(method.as_str(), &parameters, e.to_string())
        };

        Ok(match method {
            ReductionMethod::Pca => {
                ReductionConfig::Pca(serde_json::from_value(parameters.clone()).map_err(invalid)?)
            }
            ReductionMethod::Tsne => {
                ReductionConfig::Tsne(serde_json::from_value(parameters.clone()).map_err(invalid)?)
            }
            ReductionMethod::Umap => {
                ReductionConfig::Umap(serde_json::from_value(parameters.clone()).map_err(invalid)?)
            }
            ReductionMethod::Mds => {
                ReductionConfig::Mds(serde_json::from_value(parameters.clone()).map_err(invalid)?)
            }
        })
    }

    pub fn method(&self) -> ReductionMethod {
        match self {
            ReductionConfig::Pca(_) => ReductionMethod::Pca,
            ReductionConfig::Tsne(_) => ReductionMethod::Tsne,
            ReductionConfig::Umap(_) => ReductionMethod::Umap,
            ReductionConfig::Mds(_) => ReductionMethod::Mds,
        }
    }

    /// Validate and clamp every parameter against the sample count
    pub fn resolve(&self, n_samples: usize) -> Result<Self> {
        Ok(match self {
            ReductionConfig::Pca(c) => ReductionConfig::Pca(c.resolve(n_samples)?),
            ReductionConfig::Tsne(c) => ReductionConfig::Tsne(c.resolve(n_samples)?),
            ReductionConfig::Umap(c) => ReductionConfig::Umap(c.resolve(n_samples)?),
            ReductionConfig::Mds(c) => ReductionConfig::Mds(c.resolve(n_samples)?),
        })
    }

    fn standardizes_input(&self) -> bool {
        !matches!(
            self,
            ReductionConfig::Mds(MdsConfig { dissimilarity: Dissimilarity::Precomputed, .. })
        )
    }
}

/// Result of fitting a projector
#[derive(Debug, Clone)]
pub struct Projection {
    /// Projected coordinates, one row per input row
    pub coords: Array2<f64>,
    /// The fitted projector
    pub model: FittedProjector,
}

/// Fits a reduction over standardized features
#[derive(Debug, Clone)]
pub struct Projector {
    config: ReductionConfig,
    n_components: usize,
    seed: u64,
}

impl Projector {
    /// Create a 2D projector with seed 42
    pub fn new(config: ReductionConfig) -> Self {
        Self {
            config,
            n_components: 2,
            seed: 42,
        }
    }

    /// Builder method to set the output dimensionality
    pub fn with_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    /// Builder method to set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Standardize `x`, fit the reduction and project every row
    pub fn fit_transform(&self, x: &Array2<f64>) -> Result<Projection> {
        if self.n_components == 0 {
            return Err(BoundaryError::invalid_parameter(
                "n_components",
                0,
                "must be at least 1",
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(BoundaryError::DataError(
                "input contains NaN or infinite values".to_string(),
            ));
        }

        let timer = Timer::start();
        let n = x.nrows();
        let config = self.config.resolve(n)?;

        let (scaler, standardized) = if config.standardizes_input() {
            Standardizer::fit_transform(x)
        } else {
            (Standardizer::identity(x.ncols()), x.clone())
        };

        let k = self.n_components;
        let (coords, pca) = match &config {
            ReductionConfig::Pca(c) => {
                let (model, coords) = Pca::new(c.clone(), k, self.seed).fit_transform(&standardized)?;
                (coords, Some(model))
            }
            ReductionConfig::Tsne(c) => {
                (Tsne::new(c.clone(), k, self.seed).fit_transform(&standardized)?, None)
            }
            ReductionConfig::Umap(c) => {
                (Umap::new(c.clone(), k, self.seed).fit_transform(&standardized)?, None)
            }
            ReductionConfig::Mds(c) => {
                (Mds::new(c.clone(), k, self.seed).fit_transform(&standardized)?, None)
            }
        };

        debug!(
            method = %config.method(),
            n_samples = n,
            n_features = x.ncols(),
            n_components = k,
            elapsed_ms = timer.elapsed_ms(),
            "projection fitted"
        );

        Ok(Projection {
            coords,
            model: FittedProjector {
                config,
                scaler,
                pca,
                n_components: k,
            },
        })
    }
}

/// `fit_transform(points, config, seed)` for a 2D projection
pub fn fit_transform(points: &Array2<f64>, config: &ReductionConfig, seed: u64) -> Result<Projection> {
    Projector::new(config.clone()).with_seed(seed).fit_transform(points)
}

/// A fitted projection
#[derive(Debug, Clone)]
pub struct FittedProjector {
    config: ReductionConfig,
    scaler: Standardizer,
    pca: Option<PcaModel>,
    n_components: usize,
}

impl FittedProjector {
    pub fn method(&self) -> ReductionMethod {
        self.config.method()
    }

    /// Configuration after clamping
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    pub fn scaler(&self) -> &Standardizer {
        &self.scaler
    }

    /// The linear model, present for PCA only
    pub fn pca(&self) -> Option<&PcaModel> {
        self.pca.as_ref()
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn is_invertible(&self) -> bool {
        self.pca.is_some()
    }

    fn linear_model(&self) -> Result<&PcaModel> {
        self.pca.as_ref().ok_or_else(|| {
            BoundaryError::NotInvertible(format!("{} has no linear mapping", self.method()))
        })
    }

    /// Project new rows in original feature units
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.linear_model()?;
        model.transform(&self.scaler.transform(x)?)
    }

    /// Map projected coordinates back to standardized feature space
    pub fn inverse_to_standardized(&self, coords: &Array2<f64>) -> Result<Array2<f64>> {
        self.linear_model()?.inverse_transform(coords)
    }

    /// Map projected coordinates back to original feature units
    pub fn inverse_transform(&self, coords: &Array2<f64>) -> Result<Array2<f64>> {
        let standardized = self.inverse_to_standardized(coords)?;
        self.scaler.inverse_transform(&standardized)
    }

    /// One label per output axis.
    ///
    /// PCA axes name their two heaviest loadings, e.g.
    /// `"PC1: petal_length (+0.58), petal_width (+0.57)"`.
    pub fn axis_labels(&self, feature_names: &[String]) -> Vec<String> {
        let Some(model) = &self.pca else {
            let name = self.method().display_name();
            return (1..=self.n_components)
                .map(|c| format!("{name} dimension {c}"))
                .collect();
        };

        let components = model.components();
        (0..self.n_components)
            .map(|c| {
                if c >= components.nrows() {
                    return format!("PC{}", c + 1);
                }
                let mut loadings: Vec<(usize, f64)> =
                    components.row(c).iter().copied().enumerate().collect();
                loadings.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));

                let terms: Vec<String> = loadings
                    .iter()
                    .take(2)
                    .map(|&(j, w)| {
                        let name = feature_names
                            .get(j)
                            .cloned()
                            .unwrap_or_else(|| format!("x{j}"));
                        format!("{name} ({w:+.2})")
                    })
                    .collect();
                format!("PC{}: {}", c + 1, terms.join(", "))
            })
            .collect()
    }
}
