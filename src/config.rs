//! Engine configuration
//!
//! Defaults can be overridden through environment variables or a partial
//! JSON document on disk.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BoundaryError, Result};

/// Configuration shared by every scatter request handled by one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ceiling on the number of decision-boundary mesh cells
    pub max_grid_cells: u64,

    /// Default mesh step in projected space
    pub default_step: f64,

    /// Maximum points kept per class by the density filter
    pub density_threshold: usize,

    /// Oversampling factor for the density filter's k-means sample
    pub density_multiplier: usize,

    /// Random seed for every stochastic stage
    pub seed: u64,

    /// Grow the mesh step until the grid fits under `max_grid_cells`
    /// instead of failing with `ResourceExceeded`
    pub auto_step: bool,

    /// Number of k-means restarts in the density filter
    pub kmeans_n_init: usize,

    /// Lloyd iterations per k-means restart
    pub kmeans_max_iter: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_grid_cells: env_or("BOUNDARY_MAX_GRID_CELLS", 250_000),
            default_step: env_or("BOUNDARY_GRID_STEP", 0.1),
            density_threshold: env_or("BOUNDARY_DENSITY_THRESHOLD", 2000),
            density_multiplier: env_or("BOUNDARY_DENSITY_MULTIPLIER", 5),
            seed: env_or("BOUNDARY_SEED", 42),
            auto_step: false,
            kmeans_n_init: 3,
            kmeans_max_iter: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a (possibly partial) configuration from a JSON file.
    /// Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.default_step.is_finite() && self.default_step > 0.0) {
            return Err(BoundaryError::invalid_parameter(
                "default_step",
                self.default_step,
                "must be a positive finite number",
            ));
        }
        if self.max_grid_cells == 0 {
            return Err(BoundaryError::invalid_parameter("max_grid_cells", 0, "must be at least 1"));
        }
        if self.density_threshold == 0 {
            return Err(BoundaryError::invalid_parameter("density_threshold", 0, "must be at least 1"));
        }
        if self.density_multiplier == 0 {
            return Err(BoundaryError::invalid_parameter("density_multiplier", 0, "must be at least 1"));
        }
        if self.kmeans_n_init == 0 {
            return Err(BoundaryError::invalid_parameter("kmeans_n_init", 0, "must be at least 1"));
        }
        Ok(())
    }

    /// Builder method to set the mesh step
    pub fn with_step(mut self, step: f64) -> Self {
        self.default_step = step;
        self
    }

    /// Builder method to set the mesh cell ceiling
    pub fn with_max_grid_cells(mut self, cells: u64) -> Self {
        self.max_grid_cells = cells;
        self
    }

    /// Builder method to set the density filter bounds
    pub fn with_density(mut self, threshold: usize, multiplier: usize) -> Self {
        self.density_threshold = threshold;
        self.density_multiplier = multiplier;
        self
    }

    /// Builder method to set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to enable automatic step growth
    pub fn with_auto_step(mut self, auto_step: bool) -> Self {
        self.auto_step = auto_step;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.auto_step);
        assert_eq!(config.kmeans_n_init, 3);
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::new()
            .with_step(0.25)
            .with_density(100, 2)
            .with_seed(7)
            .with_auto_step(true);
        assert_eq!(config.default_step, 0.25);
        assert_eq!(config.density_threshold, 100);
        assert_eq!(config.density_multiplier, 2);
        assert_eq!(config.seed, 7);
        assert!(config.auto_step);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"default_step": 0.5}"#).unwrap();
        assert_eq!(config.default_step, 0.5);
        assert_eq!(config.kmeans_max_iter, 100);
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let config = EngineConfig::new().with_step(0.0);
        assert!(matches!(
            config.validate(),
            Err(BoundaryError::InvalidParameter { .. })
        ));
    }
}
