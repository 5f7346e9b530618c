//! Decision-boundary reconstruction
//!
//! A mesh over the projected bounding box is labelled by the classifier in
//! feature space; the labelled mesh is tessellated and merged into one
//! polygon per contiguous same-class area.

pub mod grid;
pub mod regions;
pub mod voronoi;

pub use grid::{build_grid, GridClassifier, MeshGrid, GRID_MARGIN};
pub use regions::{Region, RegionExtractor};
pub use voronoi::VoronoiTessellation;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::error::Result;
use crate::projection::FittedProjector;

/// Boundary section of the scatter payload.
///
/// `regions` and `region_classes` are present only when the projection
/// could be inverted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBoundary {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub regions: Option<Vec<Vec<[f64; 2]>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub region_classes: Option<Vec<String>>,
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
}

impl DecisionBoundary {
    /// Ranges only, no regions
    pub fn ranges_only(x_range: [f64; 2], y_range: [f64; 2]) -> Self {
        Self {
            regions: None,
            region_classes: None,
            x_range,
            y_range,
        }
    }

    /// Boundary around an empty point set
    pub fn empty() -> Self {
        Self::ranges_only([-GRID_MARGIN, GRID_MARGIN], [-GRID_MARGIN, GRID_MARGIN])
    }

    fn from_regions(regions: Vec<Region>, x_range: [f64; 2], y_range: [f64; 2]) -> Self {
        let (rings, classes): (Vec<_>, Vec<_>) = regions
            .into_iter()
            .map(|region| (region.exterior, region.class_name))
            .unzip();
        Self {
            regions: Some(rings),
            region_classes: Some(classes),
            x_range,
            y_range,
        }
    }
}

/// Build, classify and tessellate the mesh around `coords`
pub fn compute_boundary(
    coords: &Array2<f64>,
    grid_classifier: &GridClassifier,
    projector: &FittedProjector,
    classifier: &dyn Classifier,
    class_names: &[String],
) -> Result<DecisionBoundary> {
    if !projector.is_invertible() {
        let (x_range, y_range) = GridClassifier::ranges(coords)?;
        return Ok(DecisionBoundary::ranges_only(x_range, y_range));
    }

    let grid = grid_classifier.build_grid(coords)?;
    let Some(z) = grid_classifier.classify_grid(&grid, projector, classifier)? else {
        return Ok(DecisionBoundary::ranges_only(grid.x_range(), grid.y_range()));
    };

    let regions = RegionExtractor::extract(&grid.xx(), &grid.yy(), &z, class_names)?;
    Ok(DecisionBoundary::from_regions(regions, grid.x_range(), grid.y_range()))
}
