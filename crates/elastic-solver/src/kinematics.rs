//! Quadrature-point view and the kinematics derived from it.
//!
//! The discretization owns all point data; the kernel only borrows it for the
//! duration of one evaluation. Nothing here is cached: the deformation
//! gradient and current position are recomputed from the field sample on
//! every call.

use crate::materials::Tensor;
use nalgebra::SVector;

/// Per-point data supplied by the quadrature collaborator.
///
/// `shape[a]` and `gradients[a]` are the value and physical-space gradient of
/// the basis function of local node `a`; both slices have length `nen`.
#[derive(Debug, Clone, Copy)]
pub struct QuadraturePoint<'a, const D: usize> {
    /// Basis values N0[a]
    pub shape: &'a [f64],
    /// Basis gradients N1[a]
    pub gradients: &'a [SVector<f64, D>],
    /// Reference position x of the point (geometric map)
    pub position: SVector<f64, D>,
    /// Quadrature weight times the Jacobian determinant of the map
    pub weight: f64,
}

impl<'a, const D: usize> QuadraturePoint<'a, D> {
    pub fn new(
        shape: &'a [f64],
        gradients: &'a [SVector<f64, D>],
        position: SVector<f64, D>,
        weight: f64,
    ) -> Self {
        assert_eq!(
            shape.len(),
            gradients.len(),
            "shape values and gradients disagree on nen"
        );
        Self {
            shape,
            gradients,
            position,
            weight,
        }
    }

    /// Number of local nodes supported at this point.
    pub fn nen(&self) -> usize {
        self.shape.len()
    }
}

/// Interpolated displacement Σ N0[a] u[a].
pub fn displacement<const D: usize>(
    point: &QuadraturePoint<'_, D>,
    u: &[SVector<f64, D>],
) -> SVector<f64, D> {
    assert_eq!(u.len(), point.nen(), "field sample does not match nen");
    point
        .shape
        .iter()
        .zip(u)
        .fold(SVector::zeros(), |acc, (n0, ua)| acc + ua * *n0)
}

/// Current position x + Σ N0[a] u[a].
pub fn position<const D: usize>(
    point: &QuadraturePoint<'_, D>,
    u: &[SVector<f64, D>],
) -> SVector<f64, D> {
    point.position + displacement(point, u)
}

/// Deformation gradient F = I + Σ u[a] ⊗ N1[a].
pub fn deformation_gradient<const D: usize>(
    point: &QuadraturePoint<'_, D>,
    u: &[SVector<f64, D>],
) -> Tensor<D> {
    assert_eq!(u.len(), point.nen(), "field sample does not match nen");
    let mut f = Tensor::<D>::identity();
    for (ua, n1) in u.iter().zip(point.gradients) {
        f += ua * n1.transpose();
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    // Bilinear square [0,1]² evaluated at its center.
    fn center_point_data() -> ([f64; 4], [Vector2<f64>; 4]) {
        let shape = [0.25; 4];
        let gradients = [
            Vector2::new(-0.5, -0.5),
            Vector2::new(0.5, -0.5),
            Vector2::new(-0.5, 0.5),
            Vector2::new(0.5, 0.5),
        ];
        (shape, gradients)
    }

    const CORNERS: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

    #[test]
    fn zero_displacement_is_undeformed() {
        let (shape, gradients) = center_point_data();
        let point = QuadraturePoint::new(&shape, &gradients, Vector2::new(0.5, 0.5), 1.0);
        let u = [Vector2::zeros(); 4];
        assert_eq!(deformation_gradient(&point, &u), Matrix2::identity());
        assert_eq!(position(&point, &u), Vector2::new(0.5, 0.5));
    }

    #[test]
    fn affine_field_is_reproduced() {
        // u(X) = G X + c has F = I + G everywhere
        let (shape, gradients) = center_point_data();
        let point = QuadraturePoint::new(&shape, &gradients, Vector2::new(0.5, 0.5), 1.0);
        let g = Matrix2::new(0.1, -0.2, 0.05, 0.3);
        let c = Vector2::new(0.01, -0.02);
        let u: Vec<Vector2<f64>> = CORNERS
            .iter()
            .map(|x| g * Vector2::new(x[0], x[1]) + c)
            .collect();

        let f = deformation_gradient(&point, &u);
        assert!((f - (Matrix2::identity() + g)).norm() < 1e-14);

        let x = position(&point, &u);
        let expected = Vector2::new(0.5, 0.5) + g * Vector2::new(0.5, 0.5) + c;
        assert!((x - expected).norm() < 1e-14);
    }

    #[test]
    #[should_panic(expected = "field sample does not match nen")]
    fn mismatched_field_sample_panics() {
        let (shape, gradients) = center_point_data();
        let point = QuadraturePoint::new(&shape, &gradients, Vector2::zeros(), 1.0);
        let u = [Vector2::zeros(); 3];
        let _ = deformation_gradient(&point, &u);
    }
}
