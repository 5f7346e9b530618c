//! Class colour assignment
//!
//! Up to ten classes use a fixed qualitative palette. Beyond that, class
//! centroids are projected with the same reduction as the scatter plot and
//! their positions are turned into colours, so classes that sit close
//! together in feature space get similar hues.

pub mod cielab;

pub use cielab::{cielab_hex_from_xy, hex, lab_to_rgb};

use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{BoundaryError, Result};
use crate::projection::{Projector, ReductionConfig, ReductionMethod};

/// Qualitative palette used for up to ten classes
pub const DEFAULT_COLORS: [&str; 10] = [
    "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3",
    "#fdb462", "#b3de69", "#fccde5", "#d9d9d9", "#bc80bd",
];

/// Lightness used for centroid-derived colours
pub const CIELAB_LIGHTNESS: f64 = 70.0;

/// Mean feature row of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCentroid {
    pub label: i64,
    pub centroid: Array1<f64>,
    /// Number of rows averaged
    pub count: usize,
}

/// Per-class mean rows, sorted by label
pub fn compute_centroids(rows: &Array2<f64>, labels: &[i64]) -> Result<Vec<ClassCentroid>> {
    if rows.nrows() != labels.len() {
        return Err(BoundaryError::shape(
            format!("{} labels", rows.nrows()),
            format!("{} labels", labels.len()),
        ));
    }

    let mut members: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        members.entry(label).or_default().push(i);
    }

    Ok(members
        .into_iter()
        .map(|(label, indices)| {
            let class_rows = rows.select(Axis(0), &indices);
            ClassCentroid {
                label,
                centroid: class_rows
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(rows.ncols())),
                count: indices.len(),
            }
        })
        .collect())
}

fn min_samples(method: ReductionMethod) -> usize {
    match method {
        ReductionMethod::Umap => 3,
        _ => 2,
    }
}

/// Centroids in `dims` dimensions.
///
/// The reduction runs only when there are more features than `dims` and
/// enough centroids for the method; otherwise the leading raw coordinates
/// are used, padded with zeros.
fn reduce_centroids(
    centroids: &[ClassCentroid],
    reduction: &ReductionConfig,
    dims: usize,
    seed: u64,
) -> Result<Array2<f64>> {
    let n_features = centroids.first().map_or(0, |c| c.centroid.len());
    let mut matrix = Array2::zeros((centroids.len(), n_features));
    for (i, c) in centroids.iter().enumerate() {
        matrix.row_mut(i).assign(&c.centroid);
    }

    if n_features > dims && centroids.len() >= min_samples(reduction.method()) {
        let projection = Projector::new(reduction.clone())
            .with_components(dims)
            .with_seed(seed)
            .fit_transform(&matrix)?;
        return Ok(projection.coords);
    }

    debug!(n_features, dims, centroids = centroids.len(), "using raw centroid coordinates");
    let keep = n_features.min(dims);
    let mut out = Array2::zeros((centroids.len(), dims));
    out.slice_mut(s![.., ..keep]).assign(&matrix.slice(s![.., ..keep]));
    Ok(out)
}

/// Scale every column to `[0, 1]`; constant columns map to 0
fn min_max_unit(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut column in out.columns_mut() {
        let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = if hi - lo > 0.0 { hi - lo } else { 1.0 };
        column.mapv_inplace(|v| ((v - lo) / span).clamp(0.0, 1.0));
    }
    out
}

/// One `#rrggbb` per centroid from a 3D projection read as RGB
pub fn rgb_colors(centroids: &[ClassCentroid], reduction: &ReductionConfig, seed: u64) -> Result<Vec<String>> {
    if centroids.is_empty() {
        return Ok(Vec::new());
    }
    let unit = min_max_unit(&reduce_centroids(centroids, reduction, 3, seed)?);
    Ok(unit
        .rows()
        .into_iter()
        .map(|r| hex([r[0], r[1], r[2]]))
        .collect())
}

/// One `#rrggbb` per centroid from a 2D projection placed on the CIELAB
/// `a`/`b` plane
pub fn cielab_colors(centroids: &[ClassCentroid], reduction: &ReductionConfig, seed: u64) -> Result<Vec<String>> {
    if centroids.is_empty() {
        return Ok(Vec::new());
    }
    let unit = min_max_unit(&reduce_centroids(centroids, reduction, 2, seed)?);
    Ok(unit
        .rows()
        .into_iter()
        .map(|r| cielab_hex_from_xy(r[0], r[1], CIELAB_LIGHTNESS))
        .collect())
}

/// Colour per class, in ascending label order
pub fn class_colors(
    rows: &Array2<f64>,
    labels: &[i64],
    reduction: &ReductionConfig,
    seed: u64,
) -> Result<Vec<String>> {
    let centroids = compute_centroids(rows, labels)?;
    if centroids.len() <= DEFAULT_COLORS.len() {
        return Ok(DEFAULT_COLORS
            .iter()
            .take(centroids.len())
            .map(|c| c.to_string())
            .collect());
    }
    cielab_colors(&centroids, reduction, seed)
}
