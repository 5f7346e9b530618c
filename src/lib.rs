//! Kolosal Boundary - decision-boundary visualization engine
//!
//! Turns a labelled tabular dataset and a trained classifier into a 2D
//! scatter plot payload with the classifier's decision regions drawn as
//! polygons behind the points.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`projection`] - PCA, t-SNE, UMAP and MDS to two dimensions
//! - [`boundary`] - Mesh classification, Voronoi cells and region merging
//! - [`density`] - Per-class k-means thinning of the rendered points
//! - [`scatter`] - Request-scoped assembly of the wire payload
//! - [`colors`] - Class colour assignment
//!
//! ## Support
//! - [`classifier`] - The model seam and a k-NN surrogate
//! - [`config`] - Engine defaults and limits
//! - [`utils`] - Vector math, distances and eigen decomposition
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Pipeline
pub mod projection;
pub mod boundary;
pub mod density;
pub mod scatter;
pub mod colors;

// Support
pub mod classifier;
pub mod utils;
pub mod cli;

pub use error::{BoundaryError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{BoundaryError, Result};

    // Configuration
    pub use crate::config::EngineConfig;

    // Projection
    pub use crate::projection::{
        FittedProjector, Projection, Projector, ReductionConfig, ReductionMethod,
    };

    // Boundary
    pub use crate::boundary::{compute_boundary, DecisionBoundary, GridClassifier, MeshGrid, Region, RegionExtractor};

    // Density
    pub use crate::density::{DensityFilter, FilteredPoints};

    // Scatter
    pub use crate::scatter::{LabeledRows, ScatterAssembler, ScatterConfig, ScatterPayload, ScatterRequest};

    // Colours
    pub use crate::colors::{class_colors, DEFAULT_COLORS};

    // Classifier
    pub use crate::classifier::{Classifier, KnnClassifier};
}
