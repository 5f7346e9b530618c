//! Mesh construction and per-cell classification

use ndarray::Array2;
use tracing::{debug, warn};

use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::error::{BoundaryError, Result};
use crate::projection::FittedProjector;
use crate::utils::{Timer, VectorOps};

/// Margin added on every side of the projected bounding box
pub const GRID_MARGIN: f64 = 1.0;

/// Step doublings tried by `fit_step` before giving up
const MAX_STEP_DOUBLINGS: usize = 64;

/// Uniform lattice over the projected bounding box.
///
/// Row `r`, column `c` of the mesh is the point `(xs[c], ys[r])`; flattened
/// point order is row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGrid {
    xs: Vec<f64>,
    ys: Vec<f64>,
    step: f64,
    x_range: [f64; 2],
    y_range: [f64; 2],
}

impl MeshGrid {
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// `[min(x) - 1, max(x) + 1]`
    pub fn x_range(&self) -> [f64; 2] {
        self.x_range
    }

    /// `[min(y) - 1, max(y) + 1]`
    pub fn y_range(&self) -> [f64; 2] {
        self.y_range
    }

    /// `(rows, columns)` of the mesh
    pub fn shape(&self) -> (usize, usize) {
        (self.ys.len(), self.xs.len())
    }

    /// Number of mesh points
    pub fn len(&self) -> usize {
        self.xs.len() * self.ys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// X coordinate of every mesh point
    pub fn xx(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.shape(), |(_, c)| self.xs[c])
    }

    /// Y coordinate of every mesh point
    pub fn yy(&self) -> Array2<f64> {
        Array2::from_shape_fn(self.shape(), |(r, _)| self.ys[r])
    }

    /// All mesh points as rows of `[x, y]`, row-major
    pub fn points(&self) -> Array2<f64> {
        let nx = self.xs.len();
        Array2::from_shape_fn((self.len(), 2), |(i, j)| {
            if j == 0 {
                self.xs[i % nx]
            } else {
                self.ys[i / nx]
            }
        })
    }
}

/// Builds the mesh and labels it through a classifier
#[derive(Debug, Clone)]
pub struct GridClassifier {
    step: f64,
    max_cells: u64,
}

impl GridClassifier {
    pub fn new(step: f64, max_cells: u64) -> Self {
        Self { step, max_cells }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_step, config.max_grid_cells)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn max_cells(&self) -> u64 {
        self.max_cells
    }

    /// Same ceiling, different step
    pub fn with_step(&self, step: f64) -> Self {
        Self::new(step, self.max_cells)
    }

    fn validate_step(step: f64) -> Result<()> {
        if !(step.is_finite() && step > 0.0) {
            return Err(BoundaryError::invalid_parameter(
                "step",
                step,
                "must be a positive finite number",
            ));
        }
        Ok(())
    }

    /// Bounding box of `coords` widened by the margin. Empty input is
    /// treated as a single point at the origin.
    pub fn ranges(coords: &Array2<f64>) -> Result<([f64; 2], [f64; 2])> {
        if coords.ncols() != 2 {
            return Err(BoundaryError::shape("2 columns", format!("{} columns", coords.ncols())));
        }
        let (x_min, x_max) = VectorOps::column_range(coords, 0).unwrap_or((0.0, 0.0));
        let (y_min, y_max) = VectorOps::column_range(coords, 1).unwrap_or((0.0, 0.0));
        Ok((
            [x_min - GRID_MARGIN, x_max + GRID_MARGIN],
            [y_min - GRID_MARGIN, y_max + GRID_MARGIN],
        ))
    }

    /// `ceil(span / step)` points per axis, counted in floating point so
    /// that an absurd step cannot overflow before the ceiling check
    fn axis_len(range: [f64; 2], step: f64) -> f64 {
        ((range[1] - range[0]) / step).ceil().max(0.0)
    }

    /// Mesh cell count for `coords` at `step`
    pub fn cell_count(coords: &Array2<f64>, step: f64) -> Result<f64> {
        Self::validate_step(step)?;
        let (x_range, y_range) = Self::ranges(coords)?;
        Ok(Self::axis_len(x_range, step) * Self::axis_len(y_range, step))
    }

    /// Build the mesh, failing with `ResourceExceeded` before allocating
    /// when it would exceed the ceiling
    pub fn build_grid(&self, coords: &Array2<f64>) -> Result<MeshGrid> {
        let step = self.step;
        let cells = Self::cell_count(coords, step)?;
        if cells > self.max_cells as f64 {
            return Err(BoundaryError::ResourceExceeded {
                cells: cells.min(u64::MAX as f64) as u64,
                limit: self.max_cells,
            });
        }

        let (x_range, y_range) = Self::ranges(coords)?;
        let nx = Self::axis_len(x_range, step) as usize;
        let ny = Self::axis_len(y_range, step) as usize;
        let xs = (0..nx).map(|i| x_range[0] + i as f64 * step).collect();
        let ys = (0..ny).map(|i| y_range[0] + i as f64 * step).collect();

        debug!(nx, ny, step, "mesh built");

        Ok(MeshGrid {
            xs,
            ys,
            step,
            x_range,
            y_range,
        })
    }

    /// Smallest step, doubling from the configured one, whose mesh fits
    /// under the ceiling
    pub fn fit_step(&self, coords: &Array2<f64>) -> Result<f64> {
        let mut step = self.step;
        for _ in 0..MAX_STEP_DOUBLINGS {
            let cells = Self::cell_count(coords, step)?;
            if cells <= self.max_cells as f64 {
                if step != self.step {
                    warn!(requested = self.step, applied = step, cells, "grid step increased to fit the cell ceiling");
                }
                return Ok(step);
            }
            step *= 2.0;
        }
        Err(BoundaryError::ResourceExceeded {
            cells: Self::cell_count(coords, step)?.min(u64::MAX as f64) as u64,
            limit: self.max_cells,
        })
    }

    /// Label every mesh point.
    ///
    /// Mesh points are inverse-projected to feature space and passed to the
    /// classifier in one batch. Returns `None` when the projector has no
    /// inverse. Classifier errors propagate unchanged.
    pub fn classify_grid(
        &self,
        grid: &MeshGrid,
        projector: &FittedProjector,
        classifier: &dyn Classifier,
    ) -> Result<Option<Array2<i64>>> {
        if !projector.is_invertible() {
            debug!(method = %projector.method(), "projector not invertible, skipping grid classification");
            return Ok(None);
        }
        if grid.is_empty() {
            return Ok(Some(Array2::zeros(grid.shape())));
        }

        let timer = Timer::start();
        let rows = projector.inverse_transform(&grid.points())?;
        let predictions = classifier.predict(&rows)?;
        if predictions.len() != grid.len() {
            return Err(BoundaryError::shape(
                format!("{} predictions", grid.len()),
                format!("{} predictions", predictions.len()),
            ));
        }

        let z = predictions.into_shape_with_order(grid.shape())?;
        debug!(cells = grid.len(), elapsed_ms = timer.elapsed_ms(), "grid classified");
        Ok(Some(z))
    }
}

/// `build_grid(coords, step)` under an explicit cell ceiling
pub fn build_grid(coords: &Array2<f64>, step: f64, max_cells: u64) -> Result<MeshGrid> {
    GridClassifier::new(step, max_cells).build_grid(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_grid_spans_margin() {
        let coords = array![[0.0, 0.0], [2.0, 1.0]];
        let grid = build_grid(&coords, 0.5, 1_000).unwrap();
        assert_eq!(grid.x_range(), [-1.0, 3.0]);
        assert_eq!(grid.y_range(), [-1.0, 2.0]);
        assert_eq!(grid.xs().len(), 8);
        assert_eq!(grid.ys().len(), 6);
        assert_eq!(grid.xs()[0], -1.0);
        assert_eq!(grid.xs()[7], 2.5);
    }

    #[test]
    fn test_mesh_layout() {
        let coords = array![[0.0, 0.0], [1.0, 1.0]];
        let grid = build_grid(&coords, 1.0, 100).unwrap();
        let (ny, nx) = grid.shape();
        let xx = grid.xx();
        let yy = grid.yy();
        let points = grid.points();
        for r in 0..ny {
            for c in 0..nx {
                assert_eq!(points[[r * nx + c, 0]], xx[[r, c]]);
                assert_eq!(points[[r * nx + c, 1]], yy[[r, c]]);
            }
        }
    }

    #[test]
    fn test_resource_ceiling() {
        let coords = array![[0.0, 0.0], [100.0, 100.0]];
        let err = build_grid(&coords, 0.01, 1_000).unwrap_err();
        assert!(matches!(err, BoundaryError::ResourceExceeded { limit: 1_000, .. }));
    }

    #[test]
    fn test_invalid_step() {
        let coords = array![[0.0, 0.0]];
        for step in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                build_grid(&coords, step, 1_000),
                Err(BoundaryError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_fit_step_doubles() {
        let coords = array![[0.0, 0.0], [8.0, 8.0]];
        let classifier = GridClassifier::new(0.1, 1_000);
        let step = classifier.fit_step(&coords).unwrap();
        assert!(GridClassifier::cell_count(&coords, step).unwrap() <= 1_000.0);
        assert!(GridClassifier::cell_count(&coords, step / 2.0).unwrap() > 1_000.0);
    }

    #[test]
    fn test_empty_coords_use_unit_box() {
        let coords = Array2::<f64>::zeros((0, 2));
        let grid = build_grid(&coords, 0.5, 100).unwrap();
        assert_eq!(grid.x_range(), [-1.0, 1.0]);
        assert_eq!(grid.y_range(), [-1.0, 1.0]);
    }

    #[test]
    fn test_wrong_width() {
        let coords = array![[0.0, 0.0, 0.0]];
        assert!(matches!(
            build_grid(&coords, 0.5, 100),
            Err(BoundaryError::ShapeError { .. })
        ));
    }
}
