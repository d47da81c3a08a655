//! Global assembly of kernel contributions and Dirichlet reduction.
//!
//! ## Assembly Process
//!
//! 1. Gather the nodal displacements of each element from the full field
//! 2. Evaluate the kernel at every quadrature point of the element and
//!    accumulate weighted contributions into element-local buffers
//!    (elements run in parallel, each owning its own buffers)
//! 3. Scatter the element buffers into global storage serially
//!
//! Global degrees of freedom are numbered `node * D + component`. Tangents are
//! built in COO form, duplicates summed on conversion to CSR.
//!
//! ## Dirichlet Reduction
//!
//! Constrained degrees of freedom are held at zero displacement. [`DofMap`]
//! maps between the full numbering and the free subset the drivers iterate
//! on. Reactions are the full residual read back at the constrained entries.

use crate::discretization::{Discretization, ElementQuadrature};
use crate::guard::{DeterminantRange, EnergySample};
use crate::kernel::ElasticKernel;
use crate::materials::HyperelasticModel;
use nalgebra::{DMatrix, DVector, SVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;

/// Partition of the global degrees of freedom into free and constrained sets.
#[derive(Debug, Clone, PartialEq)]
pub struct DofMap {
    num_dofs: usize,
    free: Vec<usize>,
    constrained: Vec<usize>,
    /// Position of each global dof within `free`, `None` when constrained
    position: Vec<Option<usize>>,
}

impl DofMap {
    pub fn new(num_dofs: usize, constrained: &[usize]) -> Self {
        let mut is_constrained = vec![false; num_dofs];
        for &dof in constrained {
            assert!(dof < num_dofs, "constrained dof {dof} out of range ({num_dofs} dofs)");
            is_constrained[dof] = true;
        }

        let mut free = Vec::with_capacity(num_dofs);
        let mut fixed = Vec::new();
        let mut position = vec![None; num_dofs];
        for (dof, &c) in is_constrained.iter().enumerate() {
            if c {
                fixed.push(dof);
            } else {
                position[dof] = Some(free.len());
                free.push(dof);
            }
        }

        Self {
            num_dofs,
            free,
            constrained: fixed,
            position,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    pub fn free_dofs(&self) -> &[usize] {
        &self.free
    }

    pub fn constrained_dofs(&self) -> &[usize] {
        &self.constrained
    }

    /// Full field from free values; constrained entries are zero.
    pub fn expand(&self, free: &DVector<f64>) -> DVector<f64> {
        assert_eq!(free.len(), self.free.len(), "free vector does not match dof map");
        let mut full = DVector::zeros(self.num_dofs);
        for (value, &dof) in free.iter().zip(&self.free) {
            full[dof] = *value;
        }
        full
    }

    /// Free entries of a full vector.
    pub fn restrict(&self, full: &DVector<f64>) -> DVector<f64> {
        assert_eq!(full.len(), self.num_dofs, "full vector does not match dof map");
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&dof| full[dof]))
    }

    /// Free rows and columns of a full matrix.
    pub fn restrict_matrix(&self, full: &CsrMatrix<f64>) -> CsrMatrix<f64> {
        assert_eq!(
            (full.nrows(), full.ncols()),
            (self.num_dofs, self.num_dofs),
            "matrix does not match dof map"
        );
        let n = self.free.len();
        let mut coo = CooMatrix::new(n, n);
        for (r, c, v) in full.triplet_iter() {
            if let (Some(row), Some(col)) = (self.position[r], self.position[c]) {
                coo.push(row, col, *v);
            }
        }
        CsrMatrix::from(&coo)
    }

    /// Full residual read back at the constrained entries, in constrained order.
    pub fn reactions(&self, full_residual: &DVector<f64>) -> DVector<f64> {
        assert_eq!(full_residual.len(), self.num_dofs, "full vector does not match dof map");
        DVector::from_iterator(
            self.constrained.len(),
            self.constrained.iter().map(|&dof| full_residual[dof]),
        )
    }
}

/// Element-parallel assembler over a kernel and its quadrature collaborator.
pub struct Assembler<'a, M, const D: usize, Q: ?Sized> {
    kernel: &'a ElasticKernel<M, D>,
    discretization: &'a Q,
}

impl<'a, M, const D: usize, Q> Assembler<'a, M, D, Q>
where
    M: HyperelasticModel<D>,
    Q: Discretization<D> + ?Sized,
{
    pub fn new(kernel: &'a ElasticKernel<M, D>, discretization: &'a Q) -> Self {
        Self {
            kernel,
            discretization,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.discretization.num_nodes() * D
    }

    /// Global residual for the full displacement field.
    pub fn residual(&self, field: &DVector<f64>) -> DVector<f64> {
        self.check_field(field);
        let locals: Vec<_> = (0..self.discretization.num_elements())
            .into_par_iter()
            .map(|e| {
                let element = self.discretization.element(e);
                let u = gather(element, field);
                let mut local = vec![SVector::<f64, D>::zeros(); element.nen()];
                let mut scratch = local.clone();
                for data in &element.points {
                    let point = data.point();
                    self.kernel.residual(&point, &u, &mut scratch);
                    for (acc, r) in local.iter_mut().zip(&scratch) {
                        *acc += r * point.weight;
                    }
                }
                (e, local)
            })
            .collect();

        let mut global = DVector::zeros(self.num_dofs());
        for (e, local) in locals {
            let nodes = &self.discretization.element(e).nodes;
            for (node, r) in nodes.iter().zip(&local) {
                for i in 0..D {
                    global[node * D + i] += r[i];
                }
            }
        }
        global
    }

    /// Global tangent for the full displacement field.
    pub fn tangent(&self, field: &DVector<f64>) -> CsrMatrix<f64> {
        self.check_field(field);
        let locals: Vec<_> = (0..self.discretization.num_elements())
            .into_par_iter()
            .map(|e| {
                let element = self.discretization.element(e);
                let u = gather(element, field);
                let size = element.nen() * D;
                let mut local = DMatrix::<f64>::zeros(size, size);
                let mut scratch = DMatrix::<f64>::zeros(size, size);
                for data in &element.points {
                    let point = data.point();
                    self.kernel.tangent(&point, &u, &mut scratch);
                    local += &scratch * point.weight;
                }
                (e, local)
            })
            .collect();

        let n = self.num_dofs();
        let mut coo = CooMatrix::new(n, n);
        for (e, local) in locals {
            let dofs = element_dofs::<D>(&self.discretization.element(e).nodes);
            for (r, &row) in dofs.iter().enumerate() {
                for (c, &col) in dofs.iter().enumerate() {
                    let value = local[(r, c)];
                    if value != 0.0 {
                        coo.push(row, col, value);
                    }
                }
            }
        }
        CsrMatrix::from(&coo)
    }

    /// Quadrature-summed energy and the det F range over all points.
    pub fn energy(&self, field: &DVector<f64>) -> EnergySample {
        self.check_field(field);
        (0..self.discretization.num_elements())
            .into_par_iter()
            .map(|e| {
                let element = self.discretization.element(e);
                let u = gather(element, field);
                let mut sample = EnergySample {
                    total: 0.0,
                    determinants: DeterminantRange::empty(),
                };
                for data in &element.points {
                    let point = data.point();
                    let density = self.kernel.energy_density(&point, &u);
                    sample.total += density.value * point.weight;
                    sample.determinants.include(density.determinant);
                }
                sample
            })
            .reduce(EnergySample::zero, EnergySample::merge)
    }

    fn check_field(&self, field: &DVector<f64>) {
        assert_eq!(field.len(), self.num_dofs(), "field length does not match dof count");
    }
}

fn gather<const D: usize>(element: &ElementQuadrature<D>, field: &DVector<f64>) -> Vec<SVector<f64, D>> {
    element
        .nodes
        .iter()
        .map(|&node| SVector::from_fn(|i, _| field[node * D + i]))
        .collect()
}

fn element_dofs<const D: usize>(nodes: &[usize]) -> Vec<usize> {
    nodes
        .iter()
        .flat_map(|&node| (0..D).map(move |i| node * D + i))
        .collect()
}
