//! Wire payload of a scatter request

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::boundary::DecisionBoundary;
use crate::projection::ReductionMethod;

/// Everything a frontend needs to draw the scatter plot and its boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPayload {
    /// Projected position of every rendered point
    pub transformed_data: Vec<[f64; 2]>,
    /// Feature-name keyed records of the rendered points
    pub original_data: Vec<Map<String, Value>>,
    /// Raw label of every rendered point
    pub targets: Vec<i64>,
    pub decision_boundary: DecisionBoundary,
    pub method: ReductionMethod,
    /// Whether each rendered point came from the reference set
    #[serde(rename = "originalPointsNeighPointsBoolArray")]
    pub is_reference: Vec<bool>,
    pub x_axis_label: String,
    pub y_axis_label: String,
}

impl ScatterPayload {
    /// Payload for a request without any points
    pub fn empty(method: ReductionMethod, axis_labels: [String; 2]) -> Self {
        let [x_axis_label, y_axis_label] = axis_labels;
        Self {
            transformed_data: Vec::new(),
            original_data: Vec::new(),
            targets: Vec::new(),
            decision_boundary: DecisionBoundary::empty(),
            method,
            is_reference: Vec::new(),
            x_axis_label,
            y_axis_label,
        }
    }

    pub fn len(&self) -> usize {
        self.transformed_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformed_data.is_empty()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Rows of a 2-column matrix as `[x, y]` pairs
pub fn coordinate_pairs(coords: &Array2<f64>) -> Vec<[f64; 2]> {
    coords.rows().into_iter().map(|r| [r[0], r[1]]).collect()
}

/// One JSON object per row, keyed by feature name. Non-finite values
/// become `null`.
pub fn feature_records(rows: &Array2<f64>, feature_names: &[String]) -> Vec<Map<String, Value>> {
    rows.rows()
        .into_iter()
        .map(|row| feature_record(row, feature_names))
        .collect()
}

fn feature_record(row: ArrayView1<f64>, feature_names: &[String]) -> Map<String, Value> {
    feature_names
        .iter()
        .zip(row.iter())
        .map(|(name, &value)| (name.clone(), Value::from(value)))
        .collect()
}
