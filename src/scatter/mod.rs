//! Scatter assembly: one request in, one payload out
//!
//! All state lives in the request context passed to `ScatterAssembler::assemble`;
//! nothing is cached between calls.

pub mod payload;

pub use payload::{coordinate_pairs, feature_records, ScatterPayload};

use ndarray::{concatenate, Array2, Axis};
use tracing::info;

use crate::boundary::{compute_boundary, GridClassifier};
use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::density::DensityFilter;
use crate::error::{BoundaryError, Result};
use crate::projection::{Projector, ReductionConfig};
use crate::utils::Timer;

/// Feature rows with one label per row
#[derive(Debug, Clone, Copy)]
pub struct LabeledRows<'a> {
    pub rows: &'a Array2<f64>,
    pub labels: &'a [i64],
}

impl<'a> LabeledRows<'a> {
    pub fn new(rows: &'a Array2<f64>, labels: &'a [i64]) -> Self {
        Self { rows, labels }
    }

    fn check(&self, n_features: usize, what: &str) -> Result<()> {
        if self.rows.nrows() != self.labels.len() {
            return Err(BoundaryError::shape(
                format!("{} {what} labels", self.rows.nrows()),
                format!("{} labels", self.labels.len()),
            ));
        }
        if self.rows.nrows() > 0 && self.rows.ncols() != n_features {
            return Err(BoundaryError::shape(
                format!("{n_features} {what} features"),
                format!("{} features", self.rows.ncols()),
            ));
        }
        Ok(())
    }
}

/// Request-scoped inputs of one scatter computation
#[derive(Clone, Copy)]
pub struct ScatterRequest<'a> {
    /// The focal sample set
    pub focal: LabeledRows<'a>,
    /// Optional reference set projected together with the focal rows
    pub reference: Option<LabeledRows<'a>>,
    /// Column names, one per feature
    pub feature_names: &'a [String],
    /// Display name per label value
    pub class_names: &'a [String],
    /// Model queried for the decision boundary
    pub classifier: &'a dyn Classifier,
}

impl<'a> ScatterRequest<'a> {
    pub fn new(
        focal: LabeledRows<'a>,
        feature_names: &'a [String],
        class_names: &'a [String],
        classifier: &'a dyn Classifier,
    ) -> Self {
        Self {
            focal,
            reference: None,
            feature_names,
            class_names,
            classifier,
        }
    }

    pub fn with_reference(mut self, reference: LabeledRows<'a>) -> Self {
        self.reference = Some(reference);
        self
    }

    fn reference_len(&self) -> usize {
        self.reference.map_or(0, |r| r.rows.nrows())
    }

    fn validate(&self) -> Result<()> {
        let n_features = self.feature_names.len();
        self.focal.check(n_features, "focal")?;
        if let Some(reference) = &self.reference {
            reference.check(n_features, "reference")?;
        }
        Ok(())
    }

    /// Reference rows first, then focal rows
    fn combined(&self) -> Result<(Array2<f64>, Vec<i64>)> {
        let n_features = self.feature_names.len();
        let mut blocks = Vec::with_capacity(2);
        let mut labels = Vec::with_capacity(self.reference_len() + self.focal.labels.len());
        for part in self.reference.iter().chain(std::iter::once(&self.focal)) {
            if part.rows.nrows() > 0 {
                blocks.push(part.rows.view());
                labels.extend_from_slice(part.labels);
            }
        }
        let rows = if blocks.is_empty() {
            Array2::zeros((0, n_features))
        } else {
            concatenate(Axis(0), &blocks)?
        };
        Ok((rows, labels))
    }
}

/// Per-request tunables
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterConfig {
    pub reduction: ReductionConfig,
    /// Mesh step in projected space
    pub step: f64,
    /// Maximum rendered points per class
    pub threshold: usize,
    pub multiplier: usize,
    pub seed: u64,
}

impl ScatterConfig {
    /// Engine defaults with the given reduction
    pub fn new(reduction: ReductionConfig, engine: &EngineConfig) -> Self {
        Self {
            reduction,
            step: engine.default_step,
            threshold: engine.density_threshold,
            multiplier: engine.density_multiplier,
            seed: engine.seed,
        }
    }

    /// Reduction from a method name and parameter bag, everything else
    /// from the engine defaults
    pub fn from_parameters(
        method: &str,
        parameters: Option<&serde_json::Value>,
        engine: &EngineConfig,
    ) -> Result<Self> {
        Ok(Self::new(ReductionConfig::from_parameters(method, parameters)?, engine))
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_density(mut self, threshold: usize, multiplier: usize) -> Self {
        self.threshold = threshold;
        self.multiplier = multiplier;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Runs projection, boundary reconstruction and density filtering
#[derive(Debug, Clone, Default)]
pub struct ScatterAssembler {
    engine: EngineConfig,
}

impl ScatterAssembler {
    pub fn new(engine: EngineConfig) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Build the payload for one request.
    ///
    /// One projector is fitted over reference and focal rows together.
    /// The boundary uses every projected point; the rendered point cloud is
    /// density-filtered. Each rendered point is flagged as reference when
    /// its original index falls inside the reference block.
    pub fn assemble(&self, request: &ScatterRequest<'_>, config: &ScatterConfig) -> Result<ScatterPayload> {
        let timer = Timer::start();
        request.validate()?;
        let density = DensityFilter {
            threshold: config.threshold,
            multiplier: config.multiplier,
            seed: config.seed,
            ..DensityFilter::from_config(&self.engine)
        };

        let method = config.reduction.method();
        let (rows, labels) = request.combined()?;
        if rows.nrows() == 0 {
            let name = method.display_name();
            return Ok(ScatterPayload::empty(
                method,
                [format!("{name} dimension 1"), format!("{name} dimension 2")],
            ));
        }

        let projection = Projector::new(config.reduction.clone())
            .with_seed(config.seed)
            .fit_transform(&rows)?;
        let coords = &projection.coords;

        let mut grid = GridClassifier::from_config(&self.engine).with_step(config.step);
        if self.engine.auto_step && projection.model.is_invertible() {
            grid = grid.with_step(grid.fit_step(coords)?);
        }
        let boundary = compute_boundary(
            coords,
            &grid,
            &projection.model,
            request.classifier,
            request.class_names,
        )?;

        let filtered = density.filter(coords, &rows, &labels)?;
        let reference_len = request.reference_len();
        let is_reference = filtered.indices.iter().map(|&i| i < reference_len).collect();

        let [x_axis_label, y_axis_label] = match projection.model.axis_labels(request.feature_names).as_slice() {
            [x, y, ..] => [x.clone(), y.clone()],
            _ => [String::new(), String::new()],
        };

        let payload = ScatterPayload {
            transformed_data: coordinate_pairs(&filtered.points),
            original_data: feature_records(&filtered.rows, request.feature_names),
            targets: filtered.labels,
            decision_boundary: boundary,
            method,
            is_reference,
            x_axis_label,
            y_axis_label,
        };

        info!(
            method = %method,
            points = rows.nrows(),
            rendered = payload.len(),
            regions = payload.decision_boundary.regions.as_ref().map_or(0, |r| r.len()),
            elapsed_ms = timer.elapsed_ms(),
            "scatter payload assembled"
        );

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn first_feature_sign(rows: &Array2<f64>) -> Result<Array1<i64>> {
        Ok(rows.column(0).mapv(|v| i64::from(v > 0.0)))
    }

    #[test]
    fn test_reference_rows_come_first() {
        let focal = array![[1.0, 0.0], [2.0, 1.0]];
        let reference = array![[-1.0, 0.5], [-2.0, 0.0], [-3.0, 1.0]];
        let features = names("f", 2);
        let classes = names("c", 2);
        let request = ScatterRequest::new(
            LabeledRows::new(&focal, &[1, 1]),
            &features,
            &classes,
            &first_feature_sign,
        )
        .with_reference(LabeledRows::new(&reference, &[0, 0, 0]));

        let (rows, labels) = request.combined().unwrap();
        assert_eq!(rows.nrows(), 5);
        assert_eq!(rows[[0, 0]], -1.0);
        assert_eq!(labels, vec![0, 0, 0, 1, 1]);
        assert_eq!(request.reference_len(), 3);
    }

    #[test]
    fn test_label_count_mismatch() {
        let focal = array![[1.0, 0.0], [2.0, 1.0]];
        let features = names("f", 2);
        let classes = names("c", 2);
        let request = ScatterRequest::new(
            LabeledRows::new(&focal, &[1]),
            &features,
            &classes,
            &first_feature_sign,
        );
        let err = ScatterAssembler::default()
            .assemble(&request, &ScatterConfig::new(ReductionConfig::default(), &EngineConfig::default()))
            .unwrap_err();
        assert!(matches!(err, BoundaryError::ShapeError { .. }));
    }

    #[test]
    fn test_empty_request() {
        let focal = Array2::<f64>::zeros((0, 2));
        let features = names("f", 2);
        let classes = names("c", 2);
        let request = ScatterRequest::new(
            LabeledRows::new(&focal, &[]),
            &features,
            &classes,
            &first_feature_sign,
        );
        let payload = ScatterAssembler::default()
            .assemble(&request, &ScatterConfig::new(ReductionConfig::default(), &EngineConfig::default()))
            .unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.decision_boundary.x_range, [-1.0, 1.0]);
        assert_eq!(payload.decision_boundary.y_range, [-1.0, 1.0]);
    }
}
