//! Symmetric eigen-decomposition (cyclic Jacobi rotations)

use ndarray::{Array1, Array2};

use crate::error::{BoundaryError, Result};

/// Eigenpairs of a symmetric matrix, sorted by descending eigenvalue.
/// `vectors` holds one unit eigenvector per column.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

impl SymmetricEigen {
    /// Decompose `matrix` with cyclic Jacobi sweeps until the off-diagonal
    /// mass drops below `tol` or `max_sweeps` is reached.
    pub fn decompose(matrix: &Array2<f64>, max_sweeps: usize, tol: f64) -> Result<Self> {
        let n = matrix.nrows();
        if n != matrix.ncols() {
            return Err(BoundaryError::shape(
                "square matrix",
                format!("{}x{}", matrix.nrows(), matrix.ncols()),
            ));
        }

        let mut a = matrix.clone();
        let mut v = Array2::<f64>::eye(n);

        for _sweep in 0..max_sweeps {
            let mut off = 0.0;
            for p in 0..n {
                for q in (p + 1)..n {
                    off += a[[p, q]] * a[[p, q]];
                }
            }
            if off < tol {
                break;
            }

            for p in 0..n {
                for q in (p + 1)..n {
                    let apq = a[[p, q]];
                    if apq.abs() < f64::MIN_POSITIVE {
                        continue;
                    }
                    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                    let c = 1.0 / (t * t + 1.0).sqrt();
                    let s = t * c;

                    for k in 0..n {
                        let akp = a[[k, p]];
                        let akq = a[[k, q]];
                        a[[k, p]] = c * akp - s * akq;
                        a[[k, q]] = s * akp + c * akq;
                    }
                    for k in 0..n {
                        let apk = a[[p, k]];
                        let aqk = a[[q, k]];
                        a[[p, k]] = c * apk - s * aqk;
                        a[[q, k]] = s * apk + c * aqk;
                    }
                    for k in 0..n {
                        let vkp = v[[k, p]];
                        let vkq = v[[k, q]];
                        v[[k, p]] = c * vkp - s * vkq;
                        v[[k, q]] = s * vkp + c * vkq;
                    }
                }
            }
        }

        if a.iter().any(|x| !x.is_finite()) {
            return Err(BoundaryError::Computation(
                "eigen-decomposition produced non-finite values".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

        let values = Array1::from_iter(order.iter().map(|&i| a[[i, i]]));
        let mut vectors = Array2::zeros((n, n));
        for (dst, &src) in order.iter().enumerate() {
            vectors.column_mut(dst).assign(&v.column(src));
        }

        Ok(Self { values, vectors })
    }
}
