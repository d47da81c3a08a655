//! Newton line-search minimizer.
//!
//! Each iteration solves H d = −g for the Newton direction. When the solve
//! fails, produces non-finite values, or `d` is not a descent direction
//! (g·d ≥ 0), the steepest-descent direction −g is used instead. The step
//! length comes from Armijo backtracking on the objective; a failed Newton
//! line search is retried once along −g before giving up.
//!
//! Convergence tests, first match wins:
//!
//! ```text
//! ‖g‖ ≤ gatol            gradient absolute
//! ‖g‖ ≤ grtol · |f|      gradient relative
//! ‖g‖ ≤ gttol · ‖g₀‖     gradient reduction
//! ```
//!
//! A start whose objective the function reports as clamped stops at once
//! with [`TerminationReason::ClampedObjective`].

use super::{ARMIJO, ConvergenceStatus, ObjectiveFunction, SolveReport, TerminationReason};
use crate::backend::LinearSolver;
use crate::config::OptimizationConfig;
use crate::error::Result;
use nalgebra::DVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Newton,
    Gradient,
}

/// Minimizer borrowing a linear backend for the Newton directions.
pub struct Minimizer<'b> {
    config: OptimizationConfig,
    backend: &'b dyn LinearSolver,
}

impl<'b> Minimizer<'b> {
    pub fn new(config: OptimizationConfig, backend: &'b dyn LinearSolver) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn solve<F>(&self, function: &F, initial: DVector<f64>) -> Result<SolveReport>
    where
        F: ObjectiveFunction + ?Sized,
    {
        assert_eq!(
            initial.len(),
            function.dimension(),
            "initial guess does not match problem dimension"
        );

        let mut x = initial;
        let mut f = function.objective(&x);
        let mut g = function.gradient(&x);
        let gnorm0 = g.norm();
        let mut history = vec![gnorm0];
        tracing::debug!(iteration = 0, objective = f, gradient = gnorm0, "minimize");

        if !f.is_finite() || !gnorm0.is_finite() {
            return Ok(self.finish(
                ConvergenceStatus::Diverged,
                TerminationReason::NonFinite,
                0,
                x,
                history,
                f,
            ));
        }
        if function.is_clamped(f) {
            return Ok(self.finish(
                ConvergenceStatus::Diverged,
                TerminationReason::ClampedObjective,
                0,
                x,
                history,
                f,
            ));
        }
        if let Some(reason) = self.converged(gnorm0, f, gnorm0, false) {
            return Ok(self.finish(ConvergenceStatus::Converged, reason, 0, x, history, f));
        }

        for iteration in 1..=self.config.max_it {
            let (direction, kind) = self.direction(function, &x, &g);
            let accepted = self.line_search(function, &x, f, &g, &direction).or_else(|| {
                (kind == Direction::Newton)
                    .then(|| -&g)
                    .and_then(|d| self.line_search(function, &x, f, &g, &d))
            });

            let Some((step, x_next, f_next)) = accepted else {
                return Ok(self.finish(
                    ConvergenceStatus::Diverged,
                    TerminationReason::LineSearchFailure,
                    iteration - 1,
                    x,
                    history,
                    f,
                ));
            };

            x = x_next;
            f = f_next;
            g = function.gradient(&x);
            let gnorm = g.norm();
            history.push(gnorm);
            tracing::debug!(iteration, objective = f, gradient = gnorm, step, ?kind, "minimize");

            if !gnorm.is_finite() {
                return Ok(self.finish(
                    ConvergenceStatus::Diverged,
                    TerminationReason::NonFinite,
                    iteration,
                    x,
                    history,
                    f,
                ));
            }
            if let Some(reason) = self.converged(gnorm, f, gnorm0, function.is_clamped(f)) {
                return Ok(self.finish(ConvergenceStatus::Converged, reason, iteration, x, history, f));
            }
        }

        Ok(self.finish(
            ConvergenceStatus::NotConverged,
            TerminationReason::MaxIterations,
            self.config.max_it,
            x,
            history,
            f,
        ))
    }

    fn direction<F>(
        &self,
        function: &F,
        x: &DVector<f64>,
        g: &DVector<f64>,
    ) -> (DVector<f64>, Direction)
    where
        F: ObjectiveFunction + ?Sized,
    {
        let hessian = function.hessian(x);
        match self.backend.solve_linear(&hessian, &-g) {
            Ok((d, _)) if d.iter().all(|v| v.is_finite()) && g.dot(&d) < 0.0 => {
                (d, Direction::Newton)
            }
            Ok(_) => {
                tracing::debug!("newton step is not a descent direction, using gradient");
                (-g, Direction::Gradient)
            }
            Err(e) => {
                tracing::debug!(error = %e, "hessian solve failed, using gradient");
                (-g, Direction::Gradient)
            }
        }
    }

    /// Armijo backtracking; returns the accepted step, point and objective.
    fn line_search<F>(
        &self,
        function: &F,
        x: &DVector<f64>,
        f: f64,
        g: &DVector<f64>,
        direction: &DVector<f64>,
    ) -> Option<(f64, DVector<f64>, f64)>
    where
        F: ObjectiveFunction + ?Sized,
    {
        let slope = g.dot(direction);
        let mut step = 1.0;
        for _ in 0..self.config.ls_max_funcs {
            let trial = x + direction * step;
            let value = function.objective(&trial);
            if value.is_finite() && value <= f + ARMIJO * step * slope {
                return Some((step, trial, value));
            }
            step *= 0.5;
        }
        None
    }

    /// The relative test is skipped for a clamped `f`.
    fn converged(
        &self,
        gnorm: f64,
        f: f64,
        gnorm0: f64,
        clamped: bool,
    ) -> Option<TerminationReason> {
        if gnorm <= self.config.gatol {
            Some(TerminationReason::GradientAbsolute)
        } else if !clamped && gnorm <= self.config.grtol * f.abs() {
            Some(TerminationReason::GradientRelative)
        } else if gnorm <= self.config.gttol * gnorm0 {
            Some(TerminationReason::GradientReduction)
        } else {
            None
        }
    }

    fn finish(
        &self,
        status: ConvergenceStatus,
        reason: TerminationReason,
        iterations: usize,
        solution: DVector<f64>,
        history: Vec<f64>,
        objective: f64,
    ) -> SolveReport {
        let norm = history.last().copied().unwrap_or(f64::NAN);
        if status == ConvergenceStatus::Converged {
            tracing::info!(iterations, objective, gradient = norm, ?reason, "minimize converged");
        } else {
            tracing::warn!(iterations, objective, gradient = norm, ?reason, "minimize did not converge");
        }
        SolveReport {
            status,
            reason,
            iterations,
            norm,
            history,
            solution,
            objective: Some(objective),
        }
    }
}
