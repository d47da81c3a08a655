//! Newton line-search solver for R(x) = 0.
//!
//! # Newton-Raphson Method
//!
//! 1. Compute residual R_k = R(x_k)
//! 2. Compute Jacobian J_k = ∂R/∂x at x_k
//! 3. Solve J_k Δx = R_k
//! 4. Update x_{k+1} = x_k − λ Δx, λ from the line search
//! 5. Check convergence
//!
//! # Convergence Criteria
//!
//! - **Absolute**: ‖R‖ ≤ atol
//! - **Relative**: ‖R‖ ≤ rtol ‖R₀‖
//! - **Step**: λ‖Δx‖ ≤ stol ‖x‖
//!
//! # Line Search
//!
//! `bt` backtracks by halving λ until the merit function satisfies the
//! Armijo condition. The merit is ½‖R‖² unless the function registers an
//! objective and `use_objective` is set, in which case the objective itself
//! is used with slope R·(−Δx). `basic` always takes the full step.

use super::{ARMIJO, ConvergenceStatus, NonlinearFunction, SolveReport, TerminationReason};
use crate::backend::LinearSolver;
use crate::config::{LineSearchType, NewtonConfig};
use crate::error::Result;
use nalgebra::DVector;

/// Accepted line-search step.
struct Step {
    lambda: f64,
    x: DVector<f64>,
    residual: DVector<f64>,
    objective: Option<f64>,
}

/// Newton solver borrowing a linear backend.
pub struct NewtonSolver<'b> {
    config: NewtonConfig,
    backend: &'b dyn LinearSolver,
}

impl<'b> NewtonSolver<'b> {
    pub fn new(config: NewtonConfig, backend: &'b dyn LinearSolver) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    /// Iterate from `initial` until a convergence test or the iteration limit.
    ///
    /// # Errors
    /// Returns error if the backend cannot solve a Jacobian system.
    pub fn solve<F>(&self, function: &F, initial: DVector<f64>) -> Result<SolveReport>
    where
        F: NonlinearFunction + ?Sized,
    {
        assert_eq!(
            initial.len(),
            function.dimension(),
            "initial guess does not match problem dimension"
        );
        let config = &self.config;

        let mut x = initial;
        let mut r = function.residual(&x);
        let mut objective = if config.use_objective {
            function.objective(&x)
        } else {
            None
        };
        if config.use_objective && objective.is_none() {
            tracing::debug!("no objective registered, line search uses the residual norm");
        }

        let fnorm0 = r.norm();
        let mut history = vec![fnorm0];
        tracing::debug!(iteration = 0, residual = fnorm0, "newton");

        if !fnorm0.is_finite() {
            return Ok(finish(
                ConvergenceStatus::Diverged,
                TerminationReason::NonFinite,
                0,
                x,
                history,
                objective,
            ));
        }
        if fnorm0 <= config.atol {
            return Ok(finish(
                ConvergenceStatus::Converged,
                TerminationReason::ResidualAbsolute,
                0,
                x,
                history,
                objective,
            ));
        }

        for iteration in 1..=config.max_it {
            let jacobian = function.jacobian(&x);
            let (dx, info) = self.backend.solve_linear(&jacobian, &r)?;
            let direction = -dx;
            tracing::trace!(solver = %info.solver_name, residual = ?info.residual_norm, "linear solve");

            let Some(step) = self.line_search(function, &x, &r, &direction, objective) else {
                return Ok(finish(
                    ConvergenceStatus::Diverged,
                    TerminationReason::LineSearchFailure,
                    iteration - 1,
                    x,
                    history,
                    objective,
                ));
            };

            let step_norm = step.lambda * direction.norm();
            x = step.x;
            r = step.residual;
            objective = step.objective;

            let fnorm = r.norm();
            history.push(fnorm);
            tracing::debug!(iteration, residual = fnorm, lambda = step.lambda, "newton");

            let reason = if !fnorm.is_finite() {
                return Ok(finish(
                    ConvergenceStatus::Diverged,
                    TerminationReason::NonFinite,
                    iteration,
                    x,
                    history,
                    objective,
                ));
            } else if fnorm <= config.atol {
                Some(TerminationReason::ResidualAbsolute)
            } else if fnorm <= config.rtol * fnorm0 {
                Some(TerminationReason::ResidualRelative)
            } else if step_norm <= config.stol * x.norm() {
                Some(TerminationReason::StepSize)
            } else {
                None
            };

            if let Some(reason) = reason {
                return Ok(finish(ConvergenceStatus::Converged, reason, iteration, x, history, objective));
            }
        }

        Ok(finish(
            ConvergenceStatus::NotConverged,
            TerminationReason::MaxIterations,
            config.max_it,
            x,
            history,
            objective,
        ))
    }

    fn line_search<F>(
        &self,
        function: &F,
        x: &DVector<f64>,
        r: &DVector<f64>,
        direction: &DVector<f64>,
        objective: Option<f64>,
    ) -> Option<Step>
    where
        F: NonlinearFunction + ?Sized,
    {
        let evaluate = |lambda: f64| {
            let x_trial = x + direction * lambda;
            let residual = function.residual(&x_trial);
            let objective = objective.and_then(|_| function.objective(&x_trial));
            Step {
                lambda,
                x: x_trial,
                residual,
                objective,
            }
        };

        match self.config.line_search {
            LineSearchType::Basic => Some(evaluate(1.0)),
            LineSearchType::Bt => {
                // Merit value and its directional derivative at λ = 0
                let (merit0, slope) = match objective {
                    Some(f) => (f, r.dot(direction)),
                    None => (0.5 * r.norm_squared(), -r.norm_squared()),
                };
                let merit = |step: &Step| match objective {
                    Some(_) => step.objective.unwrap_or(f64::INFINITY),
                    None => 0.5 * step.residual.norm_squared(),
                };

                let mut lambda = 1.0;
                for _ in 0..=self.config.max_line_search {
                    let step = evaluate(lambda);
                    let value = merit(&step);
                    if value.is_finite() && value <= merit0 + ARMIJO * lambda * slope.min(0.0) {
                        return Some(step);
                    }
                    tracing::trace!(lambda, merit = value, "line search backtrack");
                    lambda *= 0.5;
                }
                None
            }
        }
    }
}

fn finish(
    status: ConvergenceStatus,
    reason: TerminationReason,
    iterations: usize,
    solution: DVector<f64>,
    history: Vec<f64>,
    objective: Option<f64>,
) -> SolveReport {
    let norm = history.last().copied().unwrap_or(f64::NAN);
    match status {
        ConvergenceStatus::Converged => {
            tracing::info!(iterations, residual = norm, ?reason, "newton converged");
        }
        _ => tracing::warn!(iterations, residual = norm, ?reason, "newton did not converge"),
    }
    SolveReport {
        status,
        reason,
        iterations,
        norm,
        history,
        solution,
        objective,
    }
}
