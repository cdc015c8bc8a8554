//! Dense linear algebra on small systems.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Relative size below which a Cholesky pivot is treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Cholesky factor `L` (lower triangular) of a symmetric positive definite matrix `A = L Lᵀ`.
///
/// Returns `None` if the matrix is not square or not (numerically) positive definite:
/// a pivot smaller than `PIVOT_TOLERANCE` times its diagonal entry counts as singular.
pub fn cholesky(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }
    let mut l = Array2::zeros((n, n));
    for j in 0..n {
        let mut diag = a[(j, j)];
        for k in 0..j {
            diag -= l[(j, k)] * l[(j, k)];
        }
        if !(diag > PIVOT_TOLERANCE * a[(j, j)].abs()) || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        l[(j, j)] = diag;
        for i in (j + 1)..n {
            let mut value = a[(i, j)];
            for k in 0..j {
                value -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = value / diag;
        }
    }
    Some(l)
}

/// Solve `A x = b` for symmetric positive definite `A`.
///
/// Returns `None` if `A` is not positive definite or the shapes do not match.
pub fn cholesky_solve(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Option<Array1<f64>> {
    if b.len() != a.nrows() {
        return None;
    }
    let l = cholesky(a)?;
    let n = b.len();

    // Forward substitution: L z = b
    let mut z = Array1::zeros(n);
    for i in 0..n {
        let mut value = b[i];
        for k in 0..i {
            value -= l[(i, k)] * z[k];
        }
        z[i] = value / l[(i, i)];
    }

    // Back substitution: Lᵀ x = z
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut value = z[i];
        for k in (i + 1)..n {
            value -= l[(k, i)] * x[k];
        }
        x[i] = value / l[(i, i)];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn cholesky_reconstructs() {
        let a = array![[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]];
        let l = cholesky(a.view()).unwrap();
        let reconstructed = l.dot(&l.t());
        assert!((&reconstructed - &a).iter().all(|d| d.abs() < 1e-12));
    }

    #[test]
    fn solve_matches_known_solution() {
        let a = array![[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]];
        let x = array![1.0, -2.0, 0.5];
        let b = a.dot(&x);
        let solved = cholesky_solve(a.view(), b.view()).unwrap();
        assert!((&solved - &x).iter().all(|d| d.abs() < 1e-10));
    }

    #[test]
    fn singular_is_none() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(cholesky_solve(a.view(), array![1.0, 1.0].view()).is_none());
    }

    #[test]
    fn nearly_singular_is_none() {
        let a = array![[14.0, 28.0], [28.0, 56.0]];
        assert!(cholesky(a.view()).is_none());
    }

    #[test]
    fn shape_mismatch_is_none() {
        let a = Array2::<f64>::eye(2);
        assert!(cholesky_solve(a.view(), array![1.0, 1.0, 1.0].view()).is_none());
    }
}
