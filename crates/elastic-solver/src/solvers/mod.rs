//! Nonlinear drivers and the callback contracts they iterate on.
//!
//! Two drivers are provided:
//! - [`NewtonSolver`]: root finding on R(u) = 0 with a line search
//! - [`Minimizer`]: Newton line-search minimization of an objective
//!
//! Both borrow their callbacks immutably for the duration of a solve and
//! return a [`SolveReport`]. Failure to converge is reported in the report's
//! status; only backend failures surface as errors.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

pub mod minimize;
pub mod newton;

pub use minimize::Minimizer;
pub use newton::NewtonSolver;

/// Callbacks for the root-finding formulation.
pub trait NonlinearFunction {
    /// Length of the unknown vector.
    fn dimension(&self) -> usize;

    fn residual(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian ∂R/∂x.
    fn jacobian(&self, x: &DVector<f64>) -> CsrMatrix<f64>;

    /// Merit value whose gradient is the residual, when one is registered.
    fn objective(&self, _x: &DVector<f64>) -> Option<f64> {
        None
    }
}

/// Callbacks for the minimization formulation.
pub trait ObjectiveFunction {
    fn dimension(&self) -> usize;

    fn objective(&self, x: &DVector<f64>) -> f64;

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;

    fn hessian(&self, x: &DVector<f64>) -> CsrMatrix<f64>;

    /// True if `value` was substituted for an undefined objective.
    ///
    /// A clamped value only says the point is worse than any admissible one;
    /// it is never accepted as a minimum.
    fn is_clamped(&self, _value: f64) -> bool {
        false
    }
}

/// Convergence status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// Met one of the convergence tests
    Converged,
    /// Iteration limit reached without meeting a test
    NotConverged,
    /// Line search failure or non-finite iterate
    Diverged,
}

/// Why a driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    ResidualAbsolute,
    ResidualRelative,
    StepSize,
    GradientAbsolute,
    GradientRelative,
    GradientReduction,
    MaxIterations,
    LineSearchFailure,
    NonFinite,
    /// Objective at the start was a clamp, not an energy
    ClampedObjective,
}

/// Outcome of one driver run.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: ConvergenceStatus,
    pub reason: TerminationReason,
    /// Completed iterations
    pub iterations: usize,
    /// Final residual or gradient norm
    pub norm: f64,
    /// Norm after every iteration, starting with the initial guess
    pub history: Vec<f64>,
    pub solution: DVector<f64>,
    /// Final objective, when the driver evaluated one
    pub objective: Option<f64>,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == ConvergenceStatus::Converged
    }
}

/// Sufficient-decrease parameter of the backtracking line searches.
pub(crate) const ARMIJO: f64 = 1e-4;
