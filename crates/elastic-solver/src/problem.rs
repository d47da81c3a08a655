//! Problem owner wiring the elastic kernel to a nonlinear driver.
//!
//! [`Elastic`] owns the kernel, the discretization and the current field.
//! Driver callbacks are immutable borrows of it, so they cannot outlive the
//! owner and never mutate it; the field is only written back once a solve
//! returns.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured ──configure──▶ Configured ──register──▶ Registered
//!                                                          │ solve
//!                                                          ▼
//!                               Converged | Diverged | Failed ◀── Iterating
//! ```
//!
//! Reconfiguring or registering again once callbacks are registered is a
//! programmer error and panics.
//!
//! # Example
//!
//! ```no_run
//! use elastic_solver::{
//!     Elastic, Formulation, NeoHookean, OptimizationConfig, Patch, Runtime, Setup, Side,
//! };
//! use nalgebra::Vector2;
//!
//! # fn main() -> elastic_solver::Result<()> {
//! let runtime = Runtime::initialize("beam", &["beam", "-tao_gatol", "1e-10"]);
//! let patch = Patch::new([4.0, 1.0], [8, 2]).fix_face(0, Side::Low);
//! let mut problem =
//!     Elastic::<NeoHookean<2>, 2, _>::new(&runtime, &[1.0, 1.0], Vector2::new(0.0, -0.01), patch)?;
//!
//! problem.configure(Setup::for_dimension(2));
//! problem.register(Formulation::Optimization(OptimizationConfig::from_options(
//!     runtime.options(),
//! )?))?;
//! let report = problem.solve()?;
//! println!("converged: {} in {} iterations", report.converged(), report.iterations);
//! # Ok(())
//! # }
//! ```

use crate::assembly::{Assembler, DofMap};
use crate::backend::{LinearSolver, default_backend};
use crate::config::{FormulationKind, NewtonConfig, OptimizationConfig, SolverConfig};
use crate::discretization::Discretization;
use crate::error::{Result, SolverError};
use crate::guard::{DiagnosticsSink, EnergySample, ObjectiveGuard};
use crate::kernel::ElasticKernel;
use crate::materials::HyperelasticModel;
use crate::runtime::{Communicator, Runtime};
use crate::solvers::{
    ConvergenceStatus, Minimizer, NewtonSolver, NonlinearFunction, ObjectiveFunction, SolveReport,
};
use nalgebra::{DVector, SVector};
use nalgebra_sparse::CsrMatrix;
use std::sync::Arc;

/// Field layout fixed before callbacks are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setup {
    /// Spatial dimension
    pub dim: usize,
    /// Unknowns per node
    pub dof: usize,
    /// Highest basis derivative order used
    pub order: usize,
}

impl Setup {
    /// Displacement field in `dim` dimensions with first derivatives.
    pub fn for_dimension(dim: usize) -> Self {
        Self { dim, dof: dim, order: 1 }
    }
}

/// Formulation chosen once at registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formulation {
    /// Root finding on the residual with the tangent as Jacobian
    Newton(NewtonConfig),
    /// Energy minimization with residual as gradient and tangent as Hessian
    Optimization(OptimizationConfig),
}

impl Formulation {
    pub fn name(&self) -> &'static str {
        match self {
            Formulation::Newton(_) => "newton",
            Formulation::Optimization(_) => "optimization",
        }
    }
}

impl From<&SolverConfig> for Formulation {
    fn from(config: &SolverConfig) -> Self {
        match config.formulation {
            FormulationKind::Newton => Formulation::Newton(config.newton),
            FormulationKind::Optimization => Formulation::Optimization(config.optimization),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemState {
    Unconfigured,
    Configured,
    Registered,
    Iterating,
    Converged,
    Diverged,
    Failed,
}

/// Hyperelastic problem under gravity.
pub struct Elastic<'r, M, const D: usize, Q> {
    runtime: &'r Runtime,
    comm: Communicator,
    kernel: ElasticKernel<M, D>,
    discretization: Q,
    dofs: DofMap,
    guard: ObjectiveGuard,
    backend: Box<dyn LinearSolver>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    setup: Option<Setup>,
    formulation: Option<Formulation>,
    state: ProblemState,
    /// Full displacement field, constrained entries zero
    field: DVector<f64>,
}

impl<'r, M, const D: usize, Q> Elastic<'r, M, D, Q>
where
    M: HyperelasticModel<D>,
    Q: Discretization<D>,
{
    /// Build the problem from raw material coefficients and a body force.
    ///
    /// # Errors
    /// Returns error if the runtime is finalized or the coefficients are invalid.
    pub fn new(
        runtime: &'r Runtime,
        coefficients: &[f64],
        rho_g: SVector<f64, D>,
        discretization: Q,
    ) -> Result<Self> {
        runtime.ensure_initialized()?;
        assert_eq!(
            discretization.dim(),
            D,
            "discretization dimension does not match kernel"
        );
        let model = M::from_coefficients(coefficients)?;
        let num_dofs = discretization.num_nodes() * D;
        let dofs = DofMap::new(num_dofs, &discretization.constrained_dofs());
        tracing::debug!(
            model = model.name(),
            nodes = discretization.num_nodes(),
            elements = discretization.num_elements(),
            free = dofs.num_free(),
            "elastic problem created"
        );

        Ok(Self {
            runtime,
            comm: runtime.comm_world(),
            kernel: ElasticKernel::new(model, rho_g),
            discretization,
            dofs,
            guard: ObjectiveGuard::default(),
            backend: default_backend(),
            diagnostics: None,
            setup: None,
            formulation: None,
            state: ProblemState::Unconfigured,
            field: DVector::zeros(num_dofs),
        })
    }

    /// Fix dimension, unknowns per node and derivative order.
    pub fn configure(&mut self, setup: Setup) {
        assert!(
            matches!(self.state, ProblemState::Unconfigured | ProblemState::Configured),
            "cannot reconfigure after callback registration"
        );
        assert_eq!(setup.dim, D, "configured dimension does not match kernel");
        assert_eq!(setup.dof, D, "elasticity needs one unknown per displacement component");
        assert_eq!(setup.order, 1, "elasticity kernel uses first derivatives only");
        assert!(
            self.discretization.order() >= setup.order,
            "discretization does not provide the requested derivative order"
        );
        self.setup = Some(setup);
        self.state = ProblemState::Configured;
    }

    /// Register the callbacks of one formulation.
    ///
    /// # Errors
    /// Returns error if the problem has not been configured.
    pub fn register(&mut self, formulation: Formulation) -> Result<()> {
        assert!(self.formulation.is_none(), "callbacks already registered");
        if self.state != ProblemState::Configured {
            return Err(SolverError::State(
                "configure the problem before registering callbacks".into(),
            ));
        }
        tracing::debug!(formulation = formulation.name(), "callbacks registered");
        self.formulation = Some(formulation);
        self.state = ProblemState::Registered;
        Ok(())
    }

    /// Register the formulation and guard sentinel named by the runtime options.
    pub fn register_from_options(&mut self) -> Result<()> {
        let config = SolverConfig::from_options(self.runtime.options())?;
        self.guard = config.guard();
        self.register(Formulation::from(&config))
    }

    pub fn set_guard(&mut self, guard: ObjectiveGuard) {
        self.guard = guard;
    }

    pub fn set_backend(&mut self, backend: Box<dyn LinearSolver>) {
        self.backend = backend;
    }

    pub fn set_diagnostics(&mut self, sink: Arc<dyn DiagnosticsSink>) {
        self.diagnostics = Some(sink);
    }

    /// Replace the current field. Constrained entries are forced to zero.
    pub fn set_field(&mut self, field: DVector<f64>) {
        assert_eq!(field.len(), self.dofs.num_dofs(), "field length does not match dof count");
        self.field = self.dofs.expand(&self.dofs.restrict(&field));
    }

    /// Run the registered driver from the current field.
    ///
    /// Divergence is reported in the returned status; backend failures are
    /// errors and leave the problem in [`ProblemState::Failed`].
    pub fn solve(&mut self) -> Result<SolveReport> {
        self.runtime.ensure_initialized()?;
        let formulation = match (self.formulation, self.state) {
            (None, _) => {
                return Err(SolverError::State(
                    "register callbacks before solving".into(),
                ));
            }
            (Some(_), ProblemState::Iterating) => {
                return Err(SolverError::State("solve already in progress".into()));
            }
            (Some(formulation), _) => formulation,
        };

        self.state = ProblemState::Iterating;
        let initial = self.dofs.restrict(&self.field);
        let outcome = {
            let evaluator = self.evaluator(matches!(
                formulation,
                Formulation::Newton(NewtonConfig {
                    use_objective: true,
                    ..
                })
            ));
            match formulation {
                Formulation::Newton(config) => {
                    NewtonSolver::new(config, self.backend.as_ref()).solve(&evaluator, initial)
                }
                Formulation::Optimization(config) => {
                    Minimizer::new(config, self.backend.as_ref()).solve(&evaluator, initial)
                }
            }
        };

        match outcome {
            Ok(mut report) => {
                report.solution = self.dofs.expand(&report.solution);
                self.field = report.solution.clone();
                self.state = match report.status {
                    ConvergenceStatus::Converged => ProblemState::Converged,
                    _ => ProblemState::Diverged,
                };
                Ok(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "solve failed");
                self.state = ProblemState::Failed;
                Err(e)
            }
        }
    }

    /// Full residual at the current field.
    pub fn residual(&self) -> DVector<f64> {
        Assembler::new(&self.kernel, &self.discretization).residual(&self.field)
    }

    /// Residual at the constrained degrees of freedom, in constrained order.
    pub fn reactions(&self) -> DVector<f64> {
        self.dofs.reactions(&self.residual())
    }

    /// Sum of the reactions per displacement component.
    pub fn reaction_force(&self) -> SVector<f64, D> {
        let reactions = self.reactions();
        let mut total = SVector::zeros();
        for (value, &dof) in reactions.iter().zip(self.dofs.constrained_dofs()) {
            total[dof % D] += value;
        }
        total
    }

    /// Raw total energy and det F range at the current field.
    pub fn energy_sample(&self) -> EnergySample {
        Assembler::new(&self.kernel, &self.discretization).energy(&self.field)
    }

    /// Guarded total potential energy at the current field.
    pub fn total_energy(&self) -> f64 {
        self.guard
            .apply(&self.energy_sample(), self.diagnostics.as_deref())
    }

    pub fn state(&self) -> ProblemState {
        self.state
    }

    pub fn setup(&self) -> Option<Setup> {
        self.setup
    }

    pub fn formulation(&self) -> Option<Formulation> {
        self.formulation
    }

    pub fn comm(&self) -> Communicator {
        self.comm
    }

    pub fn kernel(&self) -> &ElasticKernel<M, D> {
        &self.kernel
    }

    pub fn discretization(&self) -> &Q {
        &self.discretization
    }

    pub fn dof_map(&self) -> &DofMap {
        &self.dofs
    }

    pub fn field(&self) -> &DVector<f64> {
        &self.field
    }

    pub fn displacement(&self, node: usize) -> SVector<f64, D> {
        SVector::from_fn(|i, _| self.field[node * D + i])
    }

    fn evaluator(&self, merit: bool) -> Evaluator<'_, M, D, Q> {
        Evaluator {
            assembler: Assembler::new(&self.kernel, &self.discretization),
            dofs: &self.dofs,
            guard: self.guard,
            diagnostics: self.diagnostics.as_deref(),
            merit,
        }
    }
}

/// Callbacks over the free degrees of freedom.
struct Evaluator<'p, M, const D: usize, Q> {
    assembler: Assembler<'p, M, D, Q>,
    dofs: &'p DofMap,
    guard: ObjectiveGuard,
    diagnostics: Option<&'p dyn DiagnosticsSink>,
    /// Expose the guarded energy to the Newton line search
    merit: bool,
}

impl<M, const D: usize, Q> Evaluator<'_, M, D, Q>
where
    M: HyperelasticModel<D>,
    Q: Discretization<D>,
{
    fn guarded_energy(&self, x: &DVector<f64>) -> f64 {
        let sample = self.assembler.energy(&self.dofs.expand(x));
        self.guard.apply(&sample, self.diagnostics)
    }

    fn free_residual(&self, x: &DVector<f64>) -> DVector<f64> {
        self.dofs
            .restrict(&self.assembler.residual(&self.dofs.expand(x)))
    }

    fn free_tangent(&self, x: &DVector<f64>) -> CsrMatrix<f64> {
        self.dofs
            .restrict_matrix(&self.assembler.tangent(&self.dofs.expand(x)))
    }
}

impl<M, const D: usize, Q> NonlinearFunction for Evaluator<'_, M, D, Q>
where
    M: HyperelasticModel<D>,
    Q: Discretization<D>,
{
    fn dimension(&self) -> usize {
        self.dofs.num_free()
    }

    fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        self.free_residual(x)
    }

    fn jacobian(&self, x: &DVector<f64>) -> CsrMatrix<f64> {
        self.free_tangent(x)
    }

    fn objective(&self, x: &DVector<f64>) -> Option<f64> {
        self.merit.then(|| self.guarded_energy(x))
    }
}

impl<M, const D: usize, Q> ObjectiveFunction for Evaluator<'_, M, D, Q>
where
    M: HyperelasticModel<D>,
    Q: Discretization<D>,
{
    fn dimension(&self) -> usize {
        self.dofs.num_free()
    }

    fn objective(&self, x: &DVector<f64>) -> f64 {
        self.guarded_energy(x)
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        self.free_residual(x)
    }

    fn hessian(&self, x: &DVector<f64>) -> CsrMatrix<f64> {
        self.free_tangent(x)
    }

    fn is_clamped(&self, value: f64) -> bool {
        self.guard.is_clamped(value)
    }
}
