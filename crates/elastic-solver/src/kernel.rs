//! Per-quadrature-point elasticity kernel.
//!
//! Weak form of static equilibrium under a constant body force ρg:
//!
//! ```text
//! R_a  = ∫ P(F) · ∇N_a − ρg N_a dV                    (residual)
//! K_ab = ∂R_b / ∂u_a = ∫ dP(F; e_i ⊗ ∇N_a) · ∇N_b dV    (tangent)
//! Π(u) = ∫ ψ(F) − ρg · φ(u) dV                        (energy)
//! ```
//!
//! The kernel evaluates the integrands at one point. Integration weights and
//! the scatter into global storage belong to the assembler.

use crate::kinematics::{self, QuadraturePoint};
use crate::materials::{self, HyperelasticModel, Tensor};
use nalgebra::{DMatrix, SVector};

/// Energy density at a point together with det F, for the objective guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyDensity {
    pub value: f64,
    pub determinant: f64,
}

/// Elastic kernel owning its material model and body force.
#[derive(Debug, Clone)]
pub struct ElasticKernel<M, const D: usize> {
    model: M,
    rho_g: SVector<f64, D>,
}

impl<M: HyperelasticModel<D>, const D: usize> ElasticKernel<M, D> {
    /// Create a kernel for `model` under body force density `rho_g`.
    pub fn new(model: M, rho_g: SVector<f64, D>) -> Self {
        assert!(D == 2 || D == 3, "elasticity kernel supports d = 2 or 3");
        Self { model, rho_g }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn body_force(&self) -> &SVector<f64, D> {
        &self.rho_g
    }

    /// Local residual `residual[a] = P·N1[a] − ρg·N0[a]`.
    pub fn residual(
        &self,
        point: &QuadraturePoint<'_, D>,
        u: &[SVector<f64, D>],
        residual: &mut [SVector<f64, D>],
    ) {
        let f = kinematics::deformation_gradient(point, u);
        self.residual_at(point, &f, residual);
    }

    /// Local tangent, rows `b*D + j` (test) by columns `a*D + i` (trial).
    pub fn tangent(
        &self,
        point: &QuadraturePoint<'_, D>,
        u: &[SVector<f64, D>],
        tangent: &mut DMatrix<f64>,
    ) {
        let f = kinematics::deformation_gradient(point, u);
        self.tangent_at(point, &f, tangent);
    }

    /// Residual and tangent sharing one deformation gradient.
    pub fn residual_and_tangent(
        &self,
        point: &QuadraturePoint<'_, D>,
        u: &[SVector<f64, D>],
        residual: &mut [SVector<f64, D>],
        tangent: &mut DMatrix<f64>,
    ) {
        let f = kinematics::deformation_gradient(point, u);
        self.residual_at(point, &f, residual);
        self.tangent_at(point, &f, tangent);
    }

    /// Energy density ψ(F) − ρg·φ(u).
    pub fn energy_density(&self, point: &QuadraturePoint<'_, D>, u: &[SVector<f64, D>]) -> EnergyDensity {
        let f = kinematics::deformation_gradient(point, u);
        let phi = kinematics::position(point, u);
        EnergyDensity {
            value: self.model.energy(&f) - self.rho_g.dot(&phi),
            determinant: materials::determinant(&f),
        }
    }

    fn residual_at(
        &self,
        point: &QuadraturePoint<'_, D>,
        f: &Tensor<D>,
        residual: &mut [SVector<f64, D>],
    ) {
        assert_eq!(residual.len(), point.nen(), "residual buffer does not match nen");
        let p = self.model.stress(f);
        for ((b, n0), n1) in residual.iter_mut().zip(point.shape).zip(point.gradients) {
            *b = p * n1 - self.rho_g * *n0; // elasticity + gravity
        }
    }

    fn tangent_at(&self, point: &QuadraturePoint<'_, D>, f: &Tensor<D>, tangent: &mut DMatrix<f64>) {
        let nen = point.nen();
        assert_eq!(
            tangent.shape(),
            (nen * D, nen * D),
            "tangent buffer does not match nen"
        );
        for (a, n1_a) in point.gradients.iter().enumerate() {
            for i in 0..D {
                let mut df = Tensor::<D>::zeros();
                df.set_row(i, &n1_a.transpose());
                let dp = self.model.differential(f, &df);
                for (b, n1_b) in point.gradients.iter().enumerate() {
                    let column = dp * n1_b;
                    for j in 0..D {
                        tangent[(b * D + j, a * D + i)] = column[j];
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::NeoHookean;
    use nalgebra::{Vector2, Vector3};

    struct PointData<const D: usize> {
        shape: Vec<f64>,
        gradients: Vec<SVector<f64, D>>,
        position: SVector<f64, D>,
    }

    impl<const D: usize> PointData<D> {
        fn point(&self) -> QuadraturePoint<'_, D> {
            QuadraturePoint::new(&self.shape, &self.gradients, self.position, 1.0)
        }
    }

    // Bilinear unit square sampled off-center.
    fn quad_point() -> PointData<2> {
        let (xi, eta) = (0.3, 0.7);
        PointData {
            shape: vec![
                (1.0 - xi) * (1.0 - eta),
                xi * (1.0 - eta),
                (1.0 - xi) * eta,
                xi * eta,
            ],
            gradients: vec![
                Vector2::new(-(1.0 - eta), -(1.0 - xi)),
                Vector2::new(1.0 - eta, -xi),
                Vector2::new(-eta, 1.0 - xi),
                Vector2::new(eta, xi),
            ],
            position: Vector2::new(xi, eta),
        }
    }

    // Linear tetrahedron at its centroid.
    fn tet_point() -> PointData<3> {
        PointData {
            shape: vec![0.25; 4],
            gradients: vec![
                Vector3::new(-1.0, -1.0, -1.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            ],
            position: Vector3::new(0.25, 0.25, 0.25),
        }
    }

    fn displaced_2d() -> Vec<Vector2<f64>> {
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(0.05, -0.02),
            Vector2::new(-0.03, 0.04),
            Vector2::new(0.08, 0.01),
        ]
    }

    fn kernel_2d(rho_g: Vector2<f64>) -> ElasticKernel<NeoHookean<2>, 2> {
        ElasticKernel::new(NeoHookean::from_coefficients(&[2.0, 1.0]).unwrap(), rho_g)
    }

    #[test]
    fn zero_load_equilibrium_at_rest() {
        let kernel = kernel_2d(Vector2::zeros());
        let data = quad_point();
        let u = vec![Vector2::zeros(); 4];
        let mut residual = vec![Vector2::repeat(1.0); 4];
        kernel.residual(&data.point(), &u, &mut residual);
        assert!(residual.iter().all(|r| *r == Vector2::zeros()));
    }

    #[test]
    fn gravity_load_at_rest() {
        let rho_g = Vector2::new(0.0, -9.81);
        let kernel = kernel_2d(rho_g);
        let data = quad_point();
        let u = vec![Vector2::zeros(); 4];
        let mut residual = vec![Vector2::zeros(); 4];
        kernel.residual(&data.point(), &u, &mut residual);
        for (r, n0) in residual.iter().zip(&data.shape) {
            assert!((r - (-rho_g * *n0)).norm() < 1e-14);
        }
    }

    #[test]
    fn tangent_matches_residual_differences() {
        let kernel = kernel_2d(Vector2::new(0.3, -1.0));
        let data = quad_point();
        let point = data.point();
        let u = displaced_2d();

        let mut tangent = DMatrix::zeros(8, 8);
        let mut r0 = vec![Vector2::zeros(); 4];
        kernel.residual_and_tangent(&point, &u, &mut r0, &mut tangent);

        let eps = 1e-6;
        for a in 0..4 {
            for i in 0..2 {
                let mut up = u.clone();
                let mut um = u.clone();
                up[a][i] += eps;
                um[a][i] -= eps;
                let mut rp = vec![Vector2::zeros(); 4];
                let mut rm = vec![Vector2::zeros(); 4];
                kernel.residual(&point, &up, &mut rp);
                kernel.residual(&point, &um, &mut rm);
                for b in 0..4 {
                    for j in 0..2 {
                        let fd = (rp[b][j] - rm[b][j]) / (2.0 * eps);
                        let exact = tangent[(b * 2 + j, a * 2 + i)];
                        assert!((fd - exact).abs() < 1e-6, "K[{b},{j};{a},{i}]: {fd} vs {exact}");
                    }
                }
            }
        }
    }

    #[test]
    fn residual_is_energy_gradient() {
        let kernel = kernel_2d(Vector2::new(0.3, -1.0));
        let data = quad_point();
        let point = data.point();
        let u = displaced_2d();
        let mut residual = vec![Vector2::zeros(); 4];
        kernel.residual(&point, &u, &mut residual);

        let eps = 1e-6;
        for a in 0..4 {
            for i in 0..2 {
                let mut up = u.clone();
                let mut um = u.clone();
                up[a][i] += eps;
                um[a][i] -= eps;
                let fd = (kernel.energy_density(&point, &up).value
                    - kernel.energy_density(&point, &um).value)
                    / (2.0 * eps);
                assert!((fd - residual[a][i]).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn tangent_is_symmetric_3d() {
        let model = NeoHookean::<3>::from_coefficients(&[1.5, 0.6]).unwrap();
        let kernel = ElasticKernel::new(model, Vector3::new(0.0, 0.0, -1.0));
        let data = tet_point();
        let u = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.05, 0.01, -0.02),
            Vector3::new(-0.01, 0.03, 0.02),
            Vector3::new(0.02, -0.04, 0.06),
        ];
        let mut tangent = DMatrix::zeros(12, 12);
        kernel.tangent(&data.point(), &u, &mut tangent);
        assert!((&tangent - tangent.transpose()).norm() < 1e-12 * tangent.norm());
    }

    #[test]
    fn energy_density_reports_determinant() {
        let kernel = kernel_2d(Vector2::new(0.0, -1.0));
        let data = quad_point();
        let u = vec![Vector2::zeros(); 4];
        let e = kernel.energy_density(&data.point(), &u);
        assert_eq!(e.determinant, 1.0);
        // ψ(I) = 0, so only the gravity potential remains
        assert!((e.value - data.position[1]).abs() < 1e-14);
    }

    #[test]
    #[should_panic(expected = "residual buffer does not match nen")]
    fn undersized_residual_buffer_panics() {
        let kernel = kernel_2d(Vector2::zeros());
        let data = quad_point();
        let u = vec![Vector2::zeros(); 4];
        let mut residual = vec![Vector2::zeros(); 3];
        kernel.residual(&data.point(), &u, &mut residual);
    }

    #[test]
    #[should_panic(expected = "tangent buffer does not match nen")]
    fn undersized_tangent_buffer_panics() {
        let kernel = kernel_2d(Vector2::zeros());
        let data = quad_point();
        let u = vec![Vector2::zeros(); 4];
        let mut tangent = DMatrix::zeros(6, 6);
        kernel.tangent(&data.point(), &u, &mut tangent);
    }
}
