//! Native backend using nalgebra.
//!
//! Dense LU decomposition of the CSR system. Suitable for small-to-medium
//! problems; the sparse matrix is expanded to a dense one before factoring.

use super::traits::*;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Native solver backend using nalgebra for all numerical operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl LinearSolver for NativeBackend {
    fn solve_linear(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        let n = matrix.nrows();
        if matrix.ncols() != n || rhs.len() != n {
            return Err(BackendError(format!(
                "Dimension mismatch: {}x{} matrix with right-hand side of length {}",
                matrix.nrows(),
                matrix.ncols(),
                rhs.len()
            )));
        }

        // Reconstruct dense matrix from the CSR entries
        let mut k = DMatrix::<f64>::zeros(n, n);
        for (r, c, v) in matrix.triplet_iter() {
            k[(r, c)] += *v;
        }
        if k.iter().any(|v| !v.is_finite()) {
            return Err("Non-finite entries in system matrix".into());
        }

        // LU decomposition and solve
        let x = k
            .clone()
            .lu()
            .solve(rhs)
            .ok_or(BackendError("Singular matrix in LU decomposition".into()))?;
        if x.iter().any(|v| !v.is_finite()) {
            return Err("LU solve produced non-finite values".into());
        }

        let residual_norm = (&k * &x - rhs).norm();
        Ok((
            x,
            SolveInfo {
                iterations: 1,
                residual_norm: Some(residual_norm),
                solver_name: "nalgebra-LU".to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "native-nalgebra"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn csr(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(r, c, v) in entries {
            coo.push(r, c, v);
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn native_linear_solve_trivial() {
        // Solve: [2 0; 0 3] * [x; y] = [4; 9]
        let backend = NativeBackend;
        let matrix = csr(2, &[(0, 0, 2.0), (1, 1, 3.0)]);
        let rhs = DVector::from_vec(vec![4.0, 9.0]);

        let (x, info) = backend.solve_linear(&matrix, &rhs).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
        assert_eq!(info.solver_name, "nalgebra-LU");
        assert!(info.residual_norm.unwrap() < 1e-12);
    }

    #[test]
    fn duplicate_entries_are_summed() {
        // K = [4 -1 0; -1 4 -1; 0 -1 4] with the diagonal split in two pushes
        let backend = NativeBackend;
        let matrix = csr(
            3,
            &[
                (0, 0, 3.0),
                (0, 0, 1.0),
                (0, 1, -1.0),
                (1, 0, -1.0),
                (1, 1, 4.0),
                (1, 2, -1.0),
                (2, 1, -1.0),
                (2, 2, 4.0),
            ],
        );
        let rhs = DVector::from_vec(vec![1.0, 2.0, 1.0]);
        let (x, _) = backend.solve_linear(&matrix, &rhs).unwrap();

        let k = DMatrix::from_row_slice(3, 3, &[4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 4.0]);
        assert!((k * x - rhs).norm() < 1e-12);
    }

    #[test]
    fn singular_system_is_an_error() {
        let backend = NativeBackend;
        let matrix = csr(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let rhs = DVector::from_vec(vec![1.0, 2.0]);
        assert!(backend.solve_linear(&matrix, &rhs).is_err());
    }

    #[test]
    fn non_finite_system_is_an_error() {
        let backend = NativeBackend;
        let matrix = csr(1, &[(0, 0, f64::NAN)]);
        let rhs = DVector::from_vec(vec![1.0]);
        assert!(backend.solve_linear(&matrix, &rhs).is_err());
    }
}
