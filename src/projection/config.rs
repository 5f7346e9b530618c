//! Per-method reduction parameters
//!
//! Each reducer accepts a fixed allow-list of named parameters. Keys outside
//! the allow-list are ignored when a parameter bag is deserialized; numeric
//! values outside their valid range are clamped by `resolve`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{BoundaryError, Result};
use crate::utils::DistanceMetric;

/// Deserialize a count that may arrive as an integer or a float (`1000.0`).
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value < 0.0 {
        return Err(D::Error::custom(format!(
            "expected a non-negative count, got {value}"
        )));
    }
    Ok(value.round() as usize)
}

fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BoundaryError::invalid_parameter(name, value, "must be finite"))
    }
}

// ─── PCA ──────────────────────────────────────────────────────────────────────

/// Eigen solver used by PCA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SvdSolver {
    /// Exact solver for up to 500 features, power iteration above that
    Auto,
    /// Exact Jacobi eigen-decomposition of the covariance matrix
    Full,
    /// Power iteration with deflation, stopping at `tol`
    Arpack,
    /// A fixed number (`iterated_power`) of power iterations per component
    Randomized,
}

impl Default for SvdSolver {
    fn default() -> Self {
        Self::Auto
    }
}

/// PCA parameters (allow-list: whiten, svd_solver, tol, iterated_power)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaConfig {
    /// Scale scores to unit variance
    pub whiten: bool,
    /// Eigen solver
    pub svd_solver: SvdSolver,
    /// Convergence tolerance for the `arpack` solver
    pub tol: f64,
    /// Iteration count for the `randomized` solver
    #[serde(deserialize_with = "count")]
    pub iterated_power: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            whiten: false,
            svd_solver: SvdSolver::Auto,
            tol: 1e-10,
            iterated_power: 7,
        }
    }
}

impl PcaConfig {
    /// Validate and clamp against the sample count
    pub fn resolve(&self, _n_samples: usize) -> Result<Self> {
        ensure_finite("tol", self.tol)?;
        let mut resolved = self.clone();
        if resolved.tol < 0.0 {
            warn!(tol = resolved.tol, "PCA tol below zero, clamping to 0");
            resolved.tol = 0.0;
        }
        if resolved.iterated_power == 0 {
            warn!("PCA iterated_power of 0, clamping to 1");
            resolved.iterated_power = 1;
        }
        Ok(resolved)
    }
}

// ─── t-SNE ────────────────────────────────────────────────────────────────────

/// t-SNE learning rate: a positive number or `"auto"`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LearningRate {
    /// `max(n_samples / early_exaggeration / 4, 50)`
    Auto,
    Fixed(f64),
}

impl Default for LearningRate {
    fn default() -> Self {
        Self::Auto
    }
}

impl Serialize for LearningRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            LearningRate::Auto => serializer.serialize_str("auto"),
            LearningRate::Fixed(v) => serializer.serialize_f64(*v),
        }
    }
}

impl<'de> Deserialize<'de> for LearningRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(LearningRate::Fixed(v)),
            Raw::Text(s) if s.eq_ignore_ascii_case("auto") => Ok(LearningRate::Auto),
            Raw::Text(s) => Err(D::Error::custom(format!(
                "expected a number or \"auto\", got {s:?}"
            ))),
        }
    }
}

/// t-SNE embedding initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsneInit {
    Random,
    Pca,
}

impl Default for TsneInit {
    fn default() -> Self {
        Self::Pca
    }
}

/// t-SNE parameters (allow-list: perplexity, early_exaggeration,
/// learning_rate, n_iter, metric, init)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsneConfig {
    pub perplexity: f64,
    pub early_exaggeration: f64,
    pub learning_rate: LearningRate,
    #[serde(deserialize_with = "count")]
    pub n_iter: usize,
    pub metric: DistanceMetric,
    pub init: TsneInit,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            early_exaggeration: 12.0,
            learning_rate: LearningRate::Auto,
            n_iter: 1000,
            metric: DistanceMetric::Euclidean,
            init: TsneInit::Pca,
        }
    }
}

/// Lowest perplexity applied when the sample count allows it
pub const MIN_PERPLEXITY: f64 = 5.0;

/// Fewest optimization iterations t-SNE will run
pub const MIN_TSNE_ITER: usize = 250;

impl TsneConfig {
    /// Validate and clamp against the sample count.
    ///
    /// Perplexity is bounded by `(n_samples - 1) / 3`; it is floored at
    /// `MIN_PERPLEXITY` only when that bound allows it.
    pub fn resolve(&self, n_samples: usize) -> Result<Self> {
        ensure_finite("perplexity", self.perplexity)?;
        ensure_finite("early_exaggeration", self.early_exaggeration)?;

        let mut resolved = self.clone();
        let upper = (n_samples as f64 - 1.0) / 3.0;

        let mut perplexity = resolved.perplexity.min(upper);
        if perplexity < MIN_PERPLEXITY {
            perplexity = MIN_PERPLEXITY.min(upper);
        }
        if perplexity <= 0.0 {
            return Err(BoundaryError::invalid_parameter(
                "perplexity",
                resolved.perplexity,
                format!("no valid perplexity for {n_samples} samples"),
            ));
        }
        if perplexity != resolved.perplexity {
            warn!(
                requested = resolved.perplexity,
                applied = perplexity,
                n_samples,
                "t-SNE perplexity clamped"
            );
            resolved.perplexity = perplexity;
        }

        if resolved.early_exaggeration < 1.0 {
            warn!(
                requested = resolved.early_exaggeration,
                "t-SNE early_exaggeration below 1, clamping to 1"
            );
            resolved.early_exaggeration = 1.0;
        }

        if resolved.n_iter < MIN_TSNE_ITER {
            warn!(requested = resolved.n_iter, applied = MIN_TSNE_ITER, "t-SNE n_iter clamped");
            resolved.n_iter = MIN_TSNE_ITER;
        }

        if let LearningRate::Fixed(lr) = resolved.learning_rate {
            if !(lr.is_finite() && lr > 0.0) {
                return Err(BoundaryError::invalid_parameter(
                    "learning_rate",
                    lr,
                    "must be positive or \"auto\"",
                ));
            }
        }

        Ok(resolved)
    }

    /// Concrete learning rate for `n_samples`
    pub fn effective_learning_rate(&self, n_samples: usize) -> f64 {
        match self.learning_rate {
            LearningRate::Auto => (n_samples as f64 / self.early_exaggeration / 4.0).max(50.0),
            LearningRate::Fixed(lr) => lr,
        }
    }
}

// ─── UMAP ─────────────────────────────────────────────────────────────────────

/// UMAP parameters (allow-list: n_neighbors, min_dist, spread, n_epochs,
/// learning_rate, metric)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapConfig {
    /// Number of nearest neighbors (controls local vs global structure)
    #[serde(deserialize_with = "count")]
    pub n_neighbors: usize,
    /// Minimum distance between points in the embedding
    pub min_dist: f64,
    /// Spread of the embedding
    pub spread: f64,
    /// Number of optimization epochs
    #[serde(deserialize_with = "count")]
    pub n_epochs: usize,
    /// SGD learning rate
    pub learning_rate: f64,
    pub metric: DistanceMetric,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 200,
            learning_rate: 1.0,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl UmapConfig {
    /// Validate and clamp against the sample count
    pub fn resolve(&self, n_samples: usize) -> Result<Self> {
        ensure_finite("min_dist", self.min_dist)?;
        ensure_finite("spread", self.spread)?;
        ensure_finite("learning_rate", self.learning_rate)?;

        let mut resolved = self.clone();

        if resolved.spread <= 0.0 {
            return Err(BoundaryError::invalid_parameter("spread", resolved.spread, "must be positive"));
        }
        if resolved.learning_rate <= 0.0 {
            return Err(BoundaryError::invalid_parameter(
                "learning_rate",
                resolved.learning_rate,
                "must be positive",
            ));
        }

        let max_neighbors = n_samples.saturating_sub(1).max(2);
        let n_neighbors = resolved.n_neighbors.clamp(2, max_neighbors);
        if n_neighbors != resolved.n_neighbors {
            warn!(requested = resolved.n_neighbors, applied = n_neighbors, "UMAP n_neighbors clamped");
            resolved.n_neighbors = n_neighbors;
        }

        let min_dist = resolved.min_dist.clamp(0.0, resolved.spread);
        if min_dist != resolved.min_dist {
            warn!(requested = resolved.min_dist, applied = min_dist, "UMAP min_dist clamped");
            resolved.min_dist = min_dist;
        }

        if resolved.n_epochs == 0 {
            warn!("UMAP n_epochs of 0, clamping to 1");
            resolved.n_epochs = 1;
        }

        Ok(resolved)
    }
}

// ─── MDS ──────────────────────────────────────────────────────────────────────

/// How MDS obtains dissimilarities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dissimilarity {
    /// Euclidean distances between standardized rows
    Euclidean,
    /// The input matrix already holds pairwise dissimilarities
    Precomputed,
}

impl Default for Dissimilarity {
    fn default() -> Self {
        Self::Euclidean
    }
}

/// MDS parameters (allow-list: metric, n_init, max_iter, eps, dissimilarity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdsConfig {
    /// Metric (true) or non-metric (false) SMACOF
    pub metric: bool,
    /// Number of seeded restarts; the lowest-stress run wins
    #[serde(deserialize_with = "count")]
    pub n_init: usize,
    /// Maximum SMACOF iterations per restart
    #[serde(deserialize_with = "count")]
    pub max_iter: usize,
    /// Relative stress tolerance
    pub eps: f64,
    pub dissimilarity: Dissimilarity,
}

impl Default for MdsConfig {
    fn default() -> Self {
        Self {
            metric: true,
            n_init: 4,
            max_iter: 300,
            eps: 1e-3,
            dissimilarity: Dissimilarity::Euclidean,
        }
    }
}

impl MdsConfig {
    /// Validate and clamp
    pub fn resolve(&self, _n_samples: usize) -> Result<Self> {
        ensure_finite("eps", self.eps)?;
        let mut resolved = self.clone();
        if resolved.n_init == 0 {
            warn!("MDS n_init of 0, clamping to 1");
            resolved.n_init = 1;
        }
        if resolved.max_iter == 0 {
            warn!("MDS max_iter of 0, clamping to 1");
            resolved.max_iter = 1;
        }
        if resolved.eps < 0.0 {
            warn!(requested = resolved.eps, "MDS eps below zero, clamping to 0");
            resolved.eps = 0.0;
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_keys_ignored() {
        let config: PcaConfig =
            serde_json::from_value(serde_json::json!({"whiten": true, "bogus": 3})).unwrap();
        assert!(config.whiten);
        assert_eq!(config.svd_solver, SvdSolver::Auto);
    }

    #[test]
    fn test_learning_rate_forms() {
        let auto: TsneConfig =
            serde_json::from_value(serde_json::json!({"learning_rate": "auto"})).unwrap();
        assert_eq!(auto.learning_rate, LearningRate::Auto);

        let fixed: TsneConfig =
            serde_json::from_value(serde_json::json!({"learning_rate": 200})).unwrap();
        assert_eq!(fixed.learning_rate, LearningRate::Fixed(200.0));

        let bad = serde_json::from_value::<TsneConfig>(serde_json::json!({"learning_rate": "fast"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_counts_accept_floats() {
        let config: UmapConfig =
            serde_json::from_value(serde_json::json!({"n_neighbors": 10.0, "n_epochs": 50})).unwrap();
        assert_eq!(config.n_neighbors, 10);
        assert_eq!(config.n_epochs, 50);
    }

    #[test]
    fn test_perplexity_clamped_to_sample_bound() {
        let config = TsneConfig { perplexity: 50.0, ..Default::default() };
        let resolved = config.resolve(31).unwrap();
        assert!((resolved.perplexity - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_perplexity_floor_respects_bound() {
        let config = TsneConfig { perplexity: 1.0, ..Default::default() };
        // (10 - 1) / 3 = 3, below the floor of 5
        let resolved = config.resolve(10).unwrap();
        assert!((resolved.perplexity - 3.0).abs() < 1e-12);

        let roomy = config.resolve(100).unwrap();
        assert!((roomy.perplexity - MIN_PERPLEXITY).abs() < 1e-12);
    }

    #[test]
    fn test_perplexity_invalid_for_single_sample() {
        let config = TsneConfig::default();
        assert!(matches!(
            config.resolve(1),
            Err(BoundaryError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_tsne_rejects_negative_learning_rate() {
        let config = TsneConfig { learning_rate: LearningRate::Fixed(-1.0), ..Default::default() };
        assert!(config.resolve(100).is_err());
    }

    #[test]
    fn test_tsne_auto_learning_rate() {
        let config = TsneConfig::default();
        assert_eq!(config.effective_learning_rate(100), 50.0);
        assert!((config.effective_learning_rate(4800) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_umap_clamps() {
        let config = UmapConfig { n_neighbors: 100, min_dist: 5.0, ..Default::default() };
        let resolved = config.resolve(20).unwrap();
        assert_eq!(resolved.n_neighbors, 19);
        assert_eq!(resolved.min_dist, 1.0);
    }

    #[test]
    fn test_mds_metric_must_be_bool() {
        let bad = serde_json::from_value::<MdsConfig>(serde_json::json!({"metric": "euclidean"}));
        assert!(bad.is_err());
    }
}
