//! Backend trait definitions for the linear solves inside the drivers.
//!
//! Global tangents arrive in CSR form from the assembler; point-level work
//! never touches a backend.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

/// Error type for backend operations.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

/// Solver convergence and diagnostic info.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// Final residual norm ‖A x − b‖, if computed
    pub residual_norm: Option<f64>,
    /// Human-readable solver name (e.g., "nalgebra-LU")
    pub solver_name: String,
}

/// Trait for a linear solver backend.
///
/// Implementations solve A x = b for a square sparse matrix.
pub trait LinearSolver: Send + Sync {
    fn solve_linear(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;

    #[test]
    fn backend_error_display() {
        let err = BackendError::from("Singular matrix in LU decomposition");
        assert_eq!(err.to_string(), "Singular matrix in LU decomposition");

        let wrapped = SolverError::from(err);
        assert_eq!(
            wrapped.to_string(),
            "Linear backend failure: Singular matrix in LU decomposition"
        );
        assert!(std::error::Error::source(&wrapped).is_some());
    }
}
