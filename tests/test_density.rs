//! Integration test: per-class density filtering

use kolosal_boundary::density::{filter, DensityFilter};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn cloud(n: usize, centre: f64, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 2), |_| centre + rng.gen_range(-1.0..1.0))
}

#[test]
fn test_large_class_thinned_small_class_kept() {
    let big = cloud(5000, 0.0, 1);
    let small = cloud(10, 10.0, 2);
    let points = ndarray::concatenate(ndarray::Axis(0), &[big.view(), small.view()]).unwrap();
    let labels: Vec<i64> = (0..5010).map(|i| if i < 5000 { 0 } else { 1 }).collect();

    let filtered = DensityFilter::new(500, 2)
        .with_kmeans(1, 10)
        .filter(&points, &points, &labels)
        .unwrap();

    let class_a = filtered.labels.iter().filter(|&&l| l == 0).count();
    let class_b = filtered.labels.iter().filter(|&&l| l == 1).count();
    assert!(class_a <= 500, "class A kept {class_a}");
    assert!(class_a > 0);
    assert_eq!(class_b, 10);
    // The small class passes through untouched
    assert_eq!(&filtered.indices[filtered.len() - 10..], &(5000..5010).collect::<Vec<_>>()[..]);
}

#[test]
fn test_kept_points_are_input_points() {
    let points = cloud(300, 0.0, 3);
    let rows = Array2::from_shape_fn((300, 3), |(i, j)| (i * 3 + j) as f64);
    let labels = vec![7; 300];
    let filtered = filter(&points, &rows, &labels, 20, 3, 42).unwrap();

    assert!(filtered.len() <= 20);
    assert!(filtered.indices.windows(2).all(|w| w[0] < w[1]));
    for (k, &i) in filtered.indices.iter().enumerate() {
        assert_eq!(filtered.points.row(k), points.row(i));
        assert_eq!(filtered.rows.row(k), rows.row(i));
        assert_eq!(filtered.labels[k], 7);
    }
}

#[test]
fn test_same_seed_same_selection() {
    let points = cloud(400, 0.0, 4);
    let labels = vec![0; 400];
    let a = filter(&points, &points, &labels, 25, 4, 11).unwrap();
    let b = filter(&points, &points, &labels, 25, 4, 11).unwrap();
    assert_eq!(a.indices, b.indices);
}

#[test]
fn test_empty_input() {
    let points = Array2::<f64>::zeros((0, 2));
    let filtered = DensityFilter::default().filter(&points, &points, &[]).unwrap();
    assert!(filtered.is_empty());
}
