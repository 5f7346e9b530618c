//! Integration test: projection to two dimensions

use kolosal_boundary::projection::{fit_transform, Projector, ReductionConfig, ReductionMethod};
use kolosal_boundary::BoundaryError;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;

fn blobs(n_per_class: usize, n_features: usize, seed: u64) -> (Array2<f64>, Vec<i64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = n_per_class * 3;
    let mut labels = Vec::with_capacity(n);
    let x = Array2::from_shape_fn((n, n_features), |(i, j)| {
        let class = (i / n_per_class) as f64;
        let centre = if j % 2 == 0 { class * 6.0 } else { -class * 4.0 };
        centre + rng.gen_range(-0.5..0.5)
    });
    for i in 0..n {
        labels.push((i / n_per_class) as i64);
    }
    (x, labels)
}

#[test]
fn test_every_method_yields_two_columns() {
    let (x, _) = blobs(10, 4, 1);
    for method in ReductionMethod::ALL {
        let projection = Projector::new(method.into()).fit_transform(&x);
        let projection = projection.unwrap_or_else(|e| panic!("{method} failed: {e}"));
        assert_eq!(projection.coords.dim(), (30, 2), "{method}");
        assert!(projection.coords.iter().all(|v| v.is_finite()), "{method}");
        assert_eq!(projection.model.is_invertible(), method == ReductionMethod::Pca);
    }
}

#[test]
fn test_pca_round_trip_on_plane() {
    // Rank-2 data is reconstructed exactly
    let x = Array2::from_shape_fn((20, 3), |(i, j)| {
        let (a, b) = (i as f64, (i * i % 7) as f64);
        match j {
            0 => a,
            1 => b,
            _ => a + 2.0 * b,
        }
    });
    let projection = Projector::new(ReductionConfig::default()).fit_transform(&x).unwrap();
    let back = projection.model.inverse_transform(&projection.coords).unwrap();
    for (a, b) in x.iter().zip(back.iter()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn test_pca_axis_labels_name_features() {
    let (x, _) = blobs(10, 2, 3);
    let projection = Projector::new(ReductionConfig::default()).fit_transform(&x).unwrap();
    let names = vec!["width".to_string(), "height".to_string()];
    let labels = projection.model.axis_labels(&names);
    assert_eq!(labels.len(), 2);
    assert!(labels[0].starts_with("PC1: "));
    assert!(labels[0].contains("width") && labels[0].contains("height"));
}

#[test]
fn test_nonlinear_axis_labels() {
    let (x, _) = blobs(10, 3, 4);
    let projection = Projector::new(ReductionMethod::Mds.into()).fit_transform(&x).unwrap();
    assert_eq!(
        projection.model.axis_labels(&[]),
        vec!["MDS dimension 1", "MDS dimension 2"]
    );
    assert!(matches!(
        projection.model.inverse_transform(&projection.coords),
        Err(BoundaryError::NotInvertible(_))
    ));
}

#[test]
fn test_unknown_method_is_rejected() {
    assert!(matches!(
        ReductionConfig::from_parameters("lda", None),
        Err(BoundaryError::InvalidMethod(_))
    ));
}

#[test]
fn test_parameter_bag() {
    let config = ReductionConfig::from_parameters("tsne", Some(&json!({"perplexity": 5, "n_iter": 300, "unknown": 1})))
        .unwrap();
    assert_eq!(config.method(), ReductionMethod::Tsne);

    let err = ReductionConfig::from_parameters("umap", Some(&json!({"n_neighbors": "many"})));
    assert!(matches!(err, Err(BoundaryError::InvalidParameter { .. })));
}

#[test]
fn test_tsne_is_deterministic_per_seed() {
    let (x, _) = blobs(8, 3, 5);
    let config = ReductionConfig::from_parameters("tsne", Some(&json!({"n_iter": 300}))).unwrap();
    let a = Projector::new(config.clone()).with_seed(9).fit_transform(&x).unwrap();
    let b = Projector::new(config).with_seed(9).fit_transform(&x).unwrap();
    assert_eq!(a.coords, b.coords);
}

#[test]
fn test_free_function_matches_projector() {
    let (x, _) = blobs(6, 3, 6);
    let config = ReductionConfig::default();
    let a = fit_transform(&x, &config, 42).unwrap();
    let b = Projector::new(config).with_seed(42).fit_transform(&x).unwrap();
    assert_eq!(a.coords, b.coords);
}

#[test]
fn test_non_finite_input() {
    let mut x = Array2::<f64>::zeros((5, 2));
    x[[2, 1]] = f64::NAN;
    assert!(matches!(
        Projector::new(ReductionConfig::default()).fit_transform(&x),
        Err(BoundaryError::DataError(_))
    ));
}
