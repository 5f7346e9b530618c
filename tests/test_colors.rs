//! Integration test: class colour assignment

use kolosal_boundary::colors::{class_colors, cielab_colors, compute_centroids, rgb_colors, DEFAULT_COLORS};
use kolosal_boundary::projection::{ReductionConfig, ReductionMethod};
use ndarray::Array2;

fn many_classes(n_classes: usize) -> (Array2<f64>, Vec<i64>) {
    let n = n_classes * 3;
    let rows = Array2::from_shape_fn((n, 4), |(i, j)| {
        let class = (i / 3) as f64;
        class * (j as f64 + 1.0) + (i % 3) as f64 * 0.1 + ((class as usize * 7 + j) % 5) as f64
    });
    let labels = (0..n).map(|i| (i / 3) as i64).collect();
    (rows, labels)
}

fn is_hex(color: &str) -> bool {
    color.len() == 7 && color.starts_with('#') && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[test]
fn test_palette_up_to_ten_classes() {
    let (rows, labels) = many_classes(10);
    let colors = class_colors(&rows, &labels, &ReductionConfig::default(), 42).unwrap();
    assert_eq!(colors, DEFAULT_COLORS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
}

#[test]
fn test_centroid_colours_beyond_palette() {
    let (rows, labels) = many_classes(14);
    let colors = class_colors(&rows, &labels, &ReductionConfig::default(), 42).unwrap();
    assert_eq!(colors.len(), 14);
    assert!(colors.iter().all(|c| is_hex(c)));
    assert!(colors.iter().any(|c| !DEFAULT_COLORS.contains(&c.as_str())));
}

#[test]
fn test_every_method_colours_centroids() {
    let (rows, labels) = many_classes(12);
    let centroids = compute_centroids(&rows, &labels).unwrap();
    for method in ReductionMethod::ALL {
        let config: ReductionConfig = method.into();
        let lab = cielab_colors(&centroids, &config, 42).unwrap();
        let rgb = rgb_colors(&centroids, &config, 42).unwrap();
        assert_eq!(lab.len(), 12, "{method}");
        assert_eq!(rgb.len(), 12, "{method}");
        assert!(lab.iter().chain(rgb.iter()).all(|c| is_hex(c)), "{method}");
    }
}

#[test]
fn test_label_count_mismatch() {
    let (rows, _) = many_classes(3);
    assert!(compute_centroids(&rows, &[0, 1]).is_err());
}
