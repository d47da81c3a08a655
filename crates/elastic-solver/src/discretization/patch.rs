//! Structured patch of multilinear Lagrange cells over an axis-aligned box.
//!
//! Node numbering is lexicographic with axis 0 running fastest. Local node
//! `a` of a cell sits at corner offset `(a >> k) & 1` along axis `k`, so in
//! 2D the local order is (0,0), (1,0), (0,1), (1,1).
//!
//! Shape functions on the reference cell [-1, 1]^d:
//!
//! ```text
//! N_a(ξ) = Π_k (1 + s_k ξ_k) / 2,    s_k = ±1 for the corner of node a
//! ```
//!
//! Cells are axis aligned, so the geometric map is diagonal and the physical
//! gradients are the reference gradients scaled by 2 / h_k.

use super::gauss::{GaussPoint, gauss_1d};
use super::{Discretization, ElementQuadrature, PointData};
use nalgebra::SVector;
use std::collections::BTreeSet;

/// Which end of an axis a face lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Low,
    High,
}

/// Box `[0, L_0] × … × [0, L_{d-1}]` split into `n_k` cells per axis.
#[derive(Debug, Clone)]
pub struct Patch<const D: usize> {
    lengths: [f64; D],
    divisions: [usize; D],
    elements: Vec<ElementQuadrature<D>>,
    constrained: BTreeSet<usize>,
}

impl<const D: usize> Patch<D> {
    /// Patch with a 2-point Gauss rule per axis.
    pub fn new(lengths: [f64; D], divisions: [usize; D]) -> Self {
        Self::with_quadrature(lengths, divisions, 2)
    }

    /// Patch with a `points_per_axis`-point Gauss rule per axis (1 to 3).
    pub fn with_quadrature(lengths: [f64; D], divisions: [usize; D], points_per_axis: usize) -> Self {
        assert!(D >= 1, "patch needs at least one axis");
        assert!(
            lengths.iter().all(|l| *l > 0.0 && l.is_finite()),
            "patch lengths must be positive"
        );
        assert!(divisions.iter().all(|n| *n > 0), "patch needs at least one cell per axis");

        let rule = gauss_1d(points_per_axis);
        let mut patch = Self {
            lengths,
            divisions,
            elements: Vec::new(),
            constrained: BTreeSet::new(),
        };
        let num_cells: usize = divisions.iter().product();
        patch.elements = (0..num_cells)
            .map(|cell| patch.build_element(cell, &rule))
            .collect();
        patch
    }

    /// Cell size along each axis.
    pub fn cell_size(&self) -> [f64; D] {
        std::array::from_fn(|k| self.lengths[k] / self.divisions[k] as f64)
    }

    pub fn volume(&self) -> f64 {
        self.lengths.iter().product()
    }

    /// Resultant of a uniform body force density over the patch.
    pub fn total_body_force(&self, rho_g: &SVector<f64, D>) -> SVector<f64, D> {
        rho_g * self.volume()
    }

    pub fn node_coordinates(&self, node: usize) -> SVector<f64, D> {
        let index = self.node_index(node);
        let h = self.cell_size();
        SVector::from_fn(|k, _| index[k] as f64 * h[k])
    }

    /// Nodes lying on the face `x_axis = 0` (`Low`) or `x_axis = L_axis` (`High`).
    pub fn face_nodes(&self, axis: usize, side: Side) -> Vec<usize> {
        assert!(axis < D, "axis {axis} out of range for a {D}-d patch");
        let target = match side {
            Side::Low => 0,
            Side::High => self.divisions[axis],
        };
        (0..self.num_nodes())
            .filter(|&node| self.node_index(node)[axis] == target)
            .collect()
    }

    /// Constrain every component of every node on a face.
    pub fn fix_face(mut self, axis: usize, side: Side) -> Self {
        for node in self.face_nodes(axis, side) {
            self.constrained.extend((0..D).map(|i| node * D + i));
        }
        self
    }

    /// Constrain a single degree of freedom.
    pub fn fix_dof(mut self, node: usize, component: usize) -> Self {
        assert!(node < self.num_nodes() && component < D, "dof out of range");
        self.constrained.insert(node * D + component);
        self
    }

    fn nodes_per_axis(&self) -> [usize; D] {
        std::array::from_fn(|k| self.divisions[k] + 1)
    }

    fn node_index(&self, node: usize) -> [usize; D] {
        unravel(node, &self.nodes_per_axis())
    }

    fn node_id(&self, index: &[usize; D]) -> usize {
        ravel(index, &self.nodes_per_axis())
    }

    fn build_element(&self, cell: usize, rule: &[GaussPoint]) -> ElementQuadrature<D> {
        let cell_index = unravel(cell, &self.divisions);
        let h = self.cell_size();
        let nen = 1usize << D;

        let corner = |a: usize, k: usize| (a >> k) & 1;
        let nodes = (0..nen)
            .map(|a| {
                let index: [usize; D] = std::array::from_fn(|k| cell_index[k] + corner(a, k));
                self.node_id(&index)
            })
            .collect();

        let per_axis = [rule.len(); D];
        let num_points: usize = per_axis.iter().product();
        let points = (0..num_points)
            .map(|q| {
                let gp: [GaussPoint; D] = {
                    let qi = unravel(q, &per_axis);
                    std::array::from_fn(|k| rule[qi[k]])
                };

                // 1D factors (1 + s ξ)/2 and their ξ-derivatives s/2 for s = ∓1
                let factor = |a: usize, k: usize| {
                    let s = 2.0 * corner(a, k) as f64 - 1.0;
                    (0.5 * (1.0 + s * gp[k].xi), 0.5 * s)
                };

                let mut shape = vec![1.0; nen];
                let mut gradients = vec![SVector::<f64, D>::repeat(1.0); nen];
                for a in 0..nen {
                    for k in 0..D {
                        let (value, slope) = factor(a, k);
                        shape[a] *= value;
                        for m in 0..D {
                            gradients[a][m] *= if m == k { slope * 2.0 / h[k] } else { value };
                        }
                    }
                }

                let position = SVector::from_fn(|k, _| {
                    (cell_index[k] as f64 + 0.5 * (gp[k].xi + 1.0)) * h[k]
                });
                let weight: f64 = (0..D).map(|k| gp[k].weight * 0.5 * h[k]).product();

                PointData {
                    shape,
                    gradients,
                    position,
                    weight,
                }
            })
            .collect();

        ElementQuadrature { nodes, points }
    }
}

impl<const D: usize> Discretization<D> for Patch<D> {
    fn dim(&self) -> usize {
        D
    }

    fn num_nodes(&self) -> usize {
        self.nodes_per_axis().iter().product()
    }

    fn num_elements(&self) -> usize {
        self.elements.len()
    }

    fn element(&self, index: usize) -> &ElementQuadrature<D> {
        &self.elements[index]
    }

    fn constrained_dofs(&self) -> Vec<usize> {
        self.constrained.iter().copied().collect()
    }
}

fn unravel<const D: usize>(mut flat: usize, extents: &[usize; D]) -> [usize; D] {
    let mut index = [0; D];
    for k in 0..D {
        index[k] = flat % extents[k];
        flat /= extents[k];
    }
    index
}

fn ravel<const D: usize>(index: &[usize; D], extents: &[usize; D]) -> usize {
    index
        .iter()
        .zip(extents)
        .rev()
        .fold(0, |acc, (i, n)| acc * n + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Vector2, Vector3};

    #[test]
    fn ravel_round_trips() {
        let extents = [3, 4, 2];
        for flat in 0..24 {
            assert_eq!(ravel(&unravel(flat, &extents), &extents), flat);
        }
    }

    #[test]
    fn counts_2d() {
        let patch = Patch::<2>::new([4.0, 1.0], [4, 2]);
        assert_eq!(patch.num_nodes(), 15);
        assert_eq!(patch.num_elements(), 8);
        assert_eq!(patch.element(0).nen(), 4);
        assert_eq!(patch.element(0).points.len(), 4);
        assert_eq!(patch.element(0).nodes, vec![0, 1, 5, 6]);
        assert_eq!(patch.node_coordinates(6), Vector2::new(1.0, 0.5));
    }

    #[test]
    fn partition_of_unity() {
        let patch = Patch::<3>::with_quadrature([1.0, 2.0, 0.5], [2, 1, 1], 3);
        for e in 0..patch.num_elements() {
            for p in &patch.element(e).points {
                let sum: f64 = p.shape.iter().sum();
                let grad_sum = p.gradients.iter().fold(Vector3::zeros(), |acc, g| acc + g);
                assert!((sum - 1.0).abs() < 1e-14);
                assert!(grad_sum.norm() < 1e-12);
            }
        }
    }

    #[test]
    fn weights_integrate_volume() {
        let patch = Patch::<2>::new([3.0, 0.5], [3, 2]);
        let total: f64 = (0..patch.num_elements())
            .flat_map(|e| patch.element(e).points.iter().map(|p| p.weight))
            .sum();
        assert!((total - patch.volume()).abs() < 1e-12);
        assert_eq!(
            patch.total_body_force(&Vector2::new(0.0, -2.0)),
            Vector2::new(0.0, -3.0)
        );
    }

    #[test]
    fn interpolation_reproduces_linear_fields() {
        // Σ N_a x_a == x(ξ) and Σ x_a ⊗ ∇N_a == I
        let patch = Patch::<2>::new([2.0, 1.0], [2, 2]);
        for e in 0..patch.num_elements() {
            let element = patch.element(e);
            for p in &element.points {
                let mut x = Vector2::zeros();
                let mut grad = nalgebra::Matrix2::zeros();
                for (a, &node) in element.nodes.iter().enumerate() {
                    let xa = patch.node_coordinates(node);
                    x += xa * p.shape[a];
                    grad += xa * p.gradients[a].transpose();
                }
                assert!((x - p.position).norm() < 1e-14);
                assert!((grad - nalgebra::Matrix2::identity()).norm() < 1e-13);
            }
        }
    }

    #[test]
    fn fixed_faces() {
        let patch = Patch::<2>::new([2.0, 1.0], [2, 1]).fix_face(0, Side::Low);
        assert_eq!(patch.face_nodes(0, Side::Low), vec![0, 3]);
        assert_eq!(patch.constrained_dofs(), vec![0, 1, 6, 7]);

        let patch = patch.fix_dof(2, 1).fix_face(0, Side::Low);
        assert_eq!(patch.constrained_dofs(), vec![0, 1, 5, 6, 7]);
        assert_eq!(patch.face_nodes(1, Side::High), vec![3, 4, 5]);
    }
}
