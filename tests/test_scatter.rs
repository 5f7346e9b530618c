//! Integration test: scatter payload assembly end-to-end

use kolosal_boundary::classifier::KnnClassifier;
use kolosal_boundary::config::EngineConfig;
use kolosal_boundary::projection::{ReductionConfig, ReductionMethod};
use kolosal_boundary::scatter::{LabeledRows, ScatterAssembler, ScatterConfig, ScatterRequest};
use kolosal_boundary::{BoundaryError, Result};
use ndarray::{Array1, Array2};
use serde_json::json;

fn two_classes(n_per_class: usize, offset: f64) -> (Array2<f64>, Vec<i64>) {
    let n = n_per_class * 2;
    let rows = Array2::from_shape_fn((n, 3), |(i, j)| {
        let class = (i / n_per_class) as f64;
        let jitter = ((i * 31 + j * 17) % 11) as f64 / 11.0 - 0.5;
        class * 4.0 + jitter + offset + j as f64 * 0.1
    });
    let labels = (0..n).map(|i| (i / n_per_class) as i64).collect();
    (rows, labels)
}

fn features() -> Vec<String> {
    vec!["sepal".to_string(), "petal".to_string(), "stem".to_string()]
}

fn classes() -> Vec<String> {
    vec!["setosa".to_string(), "virginica".to_string()]
}

fn surrogate(rows: &Array2<f64>, labels: &[i64]) -> KnnClassifier {
    let mut knn = KnnClassifier::new(3);
    knn.fit(rows, labels).unwrap();
    knn
}

fn engine() -> EngineConfig {
    EngineConfig::default().with_step(0.25).with_seed(42)
}

#[test]
fn test_pca_payload_has_regions() {
    let (rows, labels) = two_classes(15, 0.0);
    let knn = surrogate(&rows, &labels);
    let (features, classes) = (features(), classes());
    let request = ScatterRequest::new(LabeledRows::new(&rows, &labels), &features, &classes, &knn);
    let config = ScatterConfig::new(ReductionConfig::default(), &engine());

    let payload = ScatterAssembler::new(engine()).assemble(&request, &config).unwrap();

    assert_eq!(payload.len(), 30);
    assert_eq!(payload.method, ReductionMethod::Pca);
    assert!(payload.targets.iter().all(|&t| t == 0 || t == 1));
    assert!(payload.is_reference.iter().all(|&r| !r));
    assert!(payload.x_axis_label.starts_with("PC1: "));
    assert!(payload.y_axis_label.starts_with("PC2: "));
    assert_eq!(payload.original_data[0].len(), 3);

    let region_classes = payload.decision_boundary.region_classes.as_ref().unwrap();
    assert!(region_classes.contains(&"setosa".to_string()));
    assert!(region_classes.contains(&"virginica".to_string()));
}

#[test]
fn test_tsne_payload_has_ranges_only() {
    let (rows, labels) = two_classes(12, 0.0);
    let knn = surrogate(&rows, &labels);
    let (features, classes) = (features(), classes());
    let request = ScatterRequest::new(LabeledRows::new(&rows, &labels), &features, &classes, &knn);
    let config = ScatterConfig::from_parameters("tsne", Some(&json!({"n_iter": 300})), &engine()).unwrap();

    let payload = ScatterAssembler::new(engine()).assemble(&request, &config).unwrap();
    let json = serde_json::to_value(&payload).unwrap();

    assert!(json["decisionBoundary"].get("regions").is_none());
    assert!(json["decisionBoundary"].get("regionClasses").is_none());
    assert!(json["decisionBoundary"]["xRange"].is_array());
    assert!(json["decisionBoundary"]["yRange"].is_array());
    assert_eq!(payload.x_axis_label, "t-SNE dimension 1");
}

#[test]
fn test_reference_flags_follow_original_index() {
    let (focal, focal_labels) = two_classes(6, 0.0);
    let (reference, reference_labels) = two_classes(4, 0.3);
    let all = ndarray::concatenate(ndarray::Axis(0), &[reference.view(), focal.view()]).unwrap();
    let all_labels: Vec<i64> = reference_labels.iter().chain(focal_labels.iter()).copied().collect();
    let knn = surrogate(&all, &all_labels);
    let (features, classes) = (features(), classes());

    let request = ScatterRequest::new(LabeledRows::new(&focal, &focal_labels), &features, &classes, &knn)
        .with_reference(LabeledRows::new(&reference, &reference_labels));
    let config = ScatterConfig::new(ReductionConfig::default(), &engine());
    let payload = ScatterAssembler::new(engine()).assemble(&request, &config).unwrap();

    assert_eq!(payload.len(), 20);
    let expected: Vec<bool> = (0..20).map(|i| i < 8).collect();
    assert_eq!(payload.is_reference, expected);
}

#[test]
fn test_density_filter_limits_rendered_points() {
    let (rows, labels) = two_classes(40, 0.0);
    let knn = surrogate(&rows, &labels);
    let (features, classes) = (features(), classes());
    let request = ScatterRequest::new(LabeledRows::new(&rows, &labels), &features, &classes, &knn);
    let config = ScatterConfig::new(ReductionConfig::default(), &engine()).with_density(10, 2);

    let payload = ScatterAssembler::new(engine()).assemble(&request, &config).unwrap();
    assert!(payload.len() <= 20);
    assert!(payload.targets.iter().filter(|&&t| t == 0).count() <= 10);
    assert!(payload.decision_boundary.regions.is_some());
}

#[test]
fn test_repeated_requests_are_identical() {
    let (rows, labels) = two_classes(10, 0.0);
    let knn = surrogate(&rows, &labels);
    let (features, classes) = (features(), classes());
    let request = ScatterRequest::new(LabeledRows::new(&rows, &labels), &features, &classes, &knn);
    let config = ScatterConfig::from_parameters("umap", Some(&json!({"n_neighbors": 5})), &engine()).unwrap();
    let assembler = ScatterAssembler::new(engine());

    let first = assembler.assemble(&request, &config).unwrap();
    let second = assembler.assemble(&request, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_targets_are_raw_labels() {
    let (rows, labels) = two_classes(10, 0.0);
    let labels: Vec<i64> = labels.iter().map(|&l| l * 4 + 3).collect();
    let knn = surrogate(&rows, &labels);
    let (features, classes) = (features(), classes());
    let request = ScatterRequest::new(LabeledRows::new(&rows, &labels), &features, &classes, &knn);
    let config = ScatterConfig::new(ReductionConfig::default(), &engine());

    let payload = ScatterAssembler::new(engine()).assemble(&request, &config).unwrap();
    assert!(payload.targets.contains(&3));
    assert!(payload.targets.contains(&7));
    assert!(payload.targets.iter().all(|&t| t == 3 || t == 7));
    assert_eq!(serde_json::to_value(&payload).unwrap()["targets"][0], json!(payload.targets[0]));
}

#[test]
fn test_classifier_error_fails_request() {
    let (rows, labels) = two_classes(10, 0.0);
    let offline = |_: &Array2<f64>| -> Result<Array1<i64>> {
        Err(BoundaryError::Prediction("model offline".to_string()))
    };
    let (features, classes) = (features(), classes());
    let request = ScatterRequest::new(LabeledRows::new(&rows, &labels), &features, &classes, &offline);
    let config = ScatterConfig::new(ReductionConfig::default(), &engine());

    let err = ScatterAssembler::new(engine()).assemble(&request, &config);
    assert!(matches!(err, Err(BoundaryError::Prediction(msg)) if msg == "model offline"));
}
