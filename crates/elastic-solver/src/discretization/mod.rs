//! Quadrature collaborator contract and a structured box patch implementing it.
//!
//! The kernel never walks a mesh. It is handed one [`QuadraturePoint`] at a
//! time by whoever implements [`Discretization`]: node lists, basis data and
//! the constrained degrees of freedom all come from there. Only first
//! derivatives of the basis are ever requested.

use crate::kinematics::QuadraturePoint;
use nalgebra::SVector;

pub mod gauss;
pub mod patch;

pub use gauss::{GaussPoint, gauss_1d};
pub use patch::{Patch, Side};

/// Owned data of one quadrature point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointData<const D: usize> {
    pub shape: Vec<f64>,
    pub gradients: Vec<SVector<f64, D>>,
    pub position: SVector<f64, D>,
    pub weight: f64,
}

impl<const D: usize> PointData<D> {
    /// Borrowed view handed to the kernel.
    pub fn point(&self) -> QuadraturePoint<'_, D> {
        QuadraturePoint::new(&self.shape, &self.gradients, self.position, self.weight)
    }
}

/// Element connectivity plus its quadrature points.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementQuadrature<const D: usize> {
    /// Global node ids; local node `a` is `nodes[a]`
    pub nodes: Vec<usize>,
    pub points: Vec<PointData<D>>,
}

impl<const D: usize> ElementQuadrature<D> {
    pub fn nen(&self) -> usize {
        self.nodes.len()
    }
}

/// Supplier of geometry, basis data and essential boundary conditions.
///
/// Degrees of freedom are numbered `node * dof + component`.
pub trait Discretization<const D: usize>: Sync {
    /// Spatial dimension of the mesh.
    fn dim(&self) -> usize;

    /// Highest basis derivative order provided with every point.
    fn order(&self) -> usize {
        1
    }

    fn num_nodes(&self) -> usize;

    fn num_elements(&self) -> usize;

    fn element(&self, index: usize) -> &ElementQuadrature<D>;

    /// Sorted, deduplicated list of constrained degrees of freedom.
    fn constrained_dofs(&self) -> Vec<usize>;
}
