//! Hyperelastic element kernel with gravity loading.
//!
//! The crate evaluates, per quadrature point, the residual, consistent
//! tangent and energy density of a hyperelastic body under a constant body
//! force, and drives them with either a Newton solver or an energy
//! minimizer.
//!
//! Layers, leaves first:
//!
//! - [`materials`]: energy, first Piola stress and its exact differential
//! - [`kinematics`]: deformation gradient and current position at a point
//! - [`kernel`]: point residual, tangent and energy density
//! - [`guard`]: sentinel clamp for the objective plus diagnostics sinks
//! - [`assembly`]: element-parallel global assembly and Dirichlet reduction
//! - [`solvers`]: Newton line search and Newton minimizer drivers
//! - [`problem`]: owner tying kernel, discretization and driver together
//!
//! [`discretization`] supplies point data through a narrow trait and ships a
//! structured box patch; [`runtime`] holds the process group handle and the
//! options database.

pub mod assembly;
pub mod backend;
pub mod config;
pub mod discretization;
pub mod error;
pub mod guard;
pub mod kernel;
pub mod kinematics;
pub mod materials;
pub mod problem;
pub mod runtime;
pub mod solvers;

pub use assembly::{Assembler, DofMap};
pub use backend::{BackendError, LinearSolver, NativeBackend, SolveInfo, default_backend};
pub use config::{FormulationKind, LineSearchType, NewtonConfig, OptimizationConfig, SolverConfig};
pub use discretization::{Discretization, ElementQuadrature, Patch, PointData, Side};
pub use error::{Result, SolverError};
pub use guard::{
    DEFAULT_SENTINEL, DeterminantRange, Diagnostic, DiagnosticsSink, EnergySample, ObjectiveGuard,
    TracingSink, VecSink,
};
pub use kernel::{ElasticKernel, EnergyDensity};
pub use kinematics::QuadraturePoint;
pub use materials::{HyperelasticModel, LameParameters, NeoHookean, StVenantKirchhoff, Tensor};
pub use problem::{Elastic, Formulation, ProblemState, Setup};
pub use runtime::{Communicator, Runtime, RuntimeOptions};
pub use solvers::{
    ConvergenceStatus, Minimizer, NewtonSolver, NonlinearFunction, ObjectiveFunction, SolveReport,
    TerminationReason,
};
