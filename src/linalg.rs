//! Dense symmetric linear algebra for PCA whitening and FastICA.
//!
//! Matrices here are small (channels × channels), so a cyclic Jacobi
//! eigen-solver is accurate and fast enough without pulling in LAPACK.
use ndarray::{Array1, Array2, Axis};

use crate::error::{IcaError, Result};

/// Eigen-decomposition of a real symmetric matrix.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues in descending order.
    pub values: Array1<f64>,
    /// Eigenvectors as columns, matching `values`.
    pub vectors: Array2<f64>,
}

/// Cyclic Jacobi eigen-decomposition.
///
/// Sweeps over every off-diagonal pair until the off-diagonal Frobenius norm
/// falls below `tol · ‖A‖_F`, or fails with [`IcaError::Convergence`] after
/// `max_sweeps`.
pub fn eigh(a: &Array2<f64>, max_sweeps: usize, tol: f64) -> Result<SymmetricEigen> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols(), "eigh needs a square matrix");
    let mut a = a.clone();
    let mut v = Array2::<f64>::eye(n);

    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);
    let mut off = off_diagonal_norm(&a);

    let mut sweeps = 0;
    while off > tol * scale {
        if sweeps == max_sweeps {
            return Err(IcaError::Convergence {
                stage: "jacobi eigen-decomposition",
                iterations: sweeps,
                tolerance: tol,
                residual: off / scale,
            });
        }
        for p in 0..n {
            for q in (p + 1)..n {
                rotate(&mut a, &mut v, p, q);
            }
        }
        off = off_diagonal_norm(&a);
        sweeps += 1;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = v.select(Axis(1), &order);
    Ok(SymmetricEigen { values, vectors })
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let mut s = 0.0;
    for ((i, j), &x) in a.indexed_iter() {
        if i != j {
            s += x * x;
        }
    }
    s.sqrt()
}

/// Annihilate `a[p, q]` with one Jacobi rotation, accumulating into `v`.
fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize) {
    let a_pq = a[[p, q]];
    if a_pq.abs() < f64::MIN_POSITIVE {
        return;
    }
    let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a_pq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    let n = a.nrows();
    for k in 0..n {
        let a_kp = a[[k, p]];
        let a_kq = a[[k, q]];
        a[[k, p]] = c * a_kp - s * a_kq;
        a[[k, q]] = s * a_kp + c * a_kq;
    }
    for k in 0..n {
        let a_pk = a[[p, k]];
        let a_qk = a[[q, k]];
        a[[p, k]] = c * a_pk - s * a_qk;
        a[[q, k]] = s * a_pk + c * a_qk;
    }
    for k in 0..n {
        let v_kp = v[[k, p]];
        let v_kq = v[[k, q]];
        v[[k, p]] = c * v_kp - s * v_kq;
        v[[k, q]] = s * v_kp + c * v_kq;
    }
}

/// Sample covariance of the rows of an already-centred `[C, T]` matrix.
pub fn covariance(centred: &Array2<f64>) -> Array2<f64> {
    let n_t = centred.ncols().max(2);
    centred.dot(&centred.t()) / (n_t - 1) as f64
}

/// Symmetric decorrelation `W ← (W Wᵀ)^{-1/2} W`.
///
/// Matches scikit-learn's `_sym_decorrelation`.
pub fn sym_decorrelation(w: &Array2<f64>) -> Result<Array2<f64>> {
    let eig = eigh(&w.dot(&w.t()), 100, 1e-14)?;
    let u = &eig.vectors;
    let mut scaled = u.clone();
    for (mut col, &s) in scaled.columns_mut().into_iter().zip(eig.values.iter()) {
        let s = s.max(f64::MIN_POSITIVE);
        col /= s.sqrt();
    }
    Ok(scaled.dot(&u.t()).dot(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn eigh_diagonal_matrix() {
        let a = array![[1.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 2.0]];
        let e = eigh(&a, 50, 1e-14).unwrap();
        assert_eq!(e.values.to_vec(), vec![3.0, 2.0, 1.0]);
        approx::assert_abs_diff_eq!(e.vectors[[1, 0]].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn eigh_reconstructs_matrix() {
        let a = array![[4.0, 1.0, 0.5, 0.2], [1.0, 3.0, 0.3, 0.1], [0.5, 0.3, 2.0, 0.7], [0.2, 0.1, 0.7, 1.0]];
        let e = eigh(&a, 50, 1e-14).unwrap();
        let lambda = Array2::from_diag(&e.values);
        let back = e.vectors.dot(&lambda).dot(&e.vectors.t());
        for (x, y) in back.iter().zip(a.iter()) {
            approx::assert_abs_diff_eq!(*x, *y, epsilon = 1e-10);
        }
        // Orthonormal eigenvectors.
        let vtv = e.vectors.t().dot(&e.vectors);
        for ((i, j), &x) in vtv.indexed_iter() {
            approx::assert_abs_diff_eq!(x, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-10);
        }
        assert!(e.values.windows(2).into_iter().all(|w| w[0] >= w[1]));
    }

    #[test]
    fn eigh_reports_non_convergence() {
        let a = array![[1.0, 0.9], [0.9, 1.0]];
        assert!(matches!(eigh(&a, 0, 1e-14), Err(IcaError::Convergence { .. })));
    }

    #[test]
    fn sym_decorrelation_yields_orthogonal_matrix() {
        let w = array![[1.0, 0.4, 0.1], [0.2, 1.5, -0.3], [0.0, 0.6, 0.8]];
        let d = sym_decorrelation(&w).unwrap();
        let ddt = d.dot(&d.t());
        for ((i, j), &x) in ddt.indexed_iter() {
            approx::assert_abs_diff_eq!(x, if i == j { 1.0 } else { 0.0 }, epsilon = 1e-10);
        }
    }
}
