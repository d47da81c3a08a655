//! Hyperelastic material models.
//!
//! A model is a pure function of the deformation gradient `F`:
//!
//! - `energy(F)`: strain-energy density ψ(F)
//! - `stress(F)`: first Piola–Kirchhoff stress P = ∂ψ/∂F
//! - `differential(F, dF)`: the exact directional derivative dP = ∂P/∂F : dF
//!
//! Models never clamp. Degenerate or inverted `F` (det F ≤ 0) may produce very
//! large or non-finite values; the objective guard decides what to do with them.

use crate::error::{Result, SolverError};
use nalgebra::{DMatrix, SMatrix};

pub mod neo_hookean;
pub mod st_venant_kirchhoff;

pub use neo_hookean::NeoHookean;
pub use st_venant_kirchhoff::StVenantKirchhoff;

/// Square `D×D` matrix used for deformation gradients and stresses.
pub type Tensor<const D: usize> = SMatrix<f64, D, D>;

/// det F for any dimension.
///
/// `SMatrix::determinant` is only available when the dimension is known to
/// satisfy `DimMin`, which a bare `const D: usize` does not. Dimensions up to
/// three use the closed forms; larger ones go through a dense LU.
pub fn determinant<const D: usize>(f: &Tensor<D>) -> f64 {
    match D {
        0 => 1.0,
        1 => f[(0, 0)],
        2 => f[(0, 0)] * f[(1, 1)] - f[(0, 1)] * f[(1, 0)],
        3 => {
            f[(0, 0)] * (f[(1, 1)] * f[(2, 2)] - f[(1, 2)] * f[(2, 1)])
                - f[(0, 1)] * (f[(1, 0)] * f[(2, 2)] - f[(1, 2)] * f[(2, 0)])
                + f[(0, 2)] * (f[(1, 0)] * f[(2, 1)] - f[(1, 1)] * f[(2, 0)])
        }
        _ => DMatrix::from_column_slice(D, D, f.as_slice()).determinant(),
    }
}

/// Constitutive interface consumed by the element kernel.
///
/// Implementations are immutable after construction, so one instance can be
/// shared by every quadrature point and every worker thread.
pub trait HyperelasticModel<const D: usize>: Send + Sync {
    /// Build the model from a raw coefficient array.
    fn from_coefficients(coefficients: &[f64]) -> Result<Self>
    where
        Self: Sized;

    /// Strain-energy density at `f`.
    fn energy(&self, f: &Tensor<D>) -> f64;

    /// First Piola–Kirchhoff stress at `f`.
    fn stress(&self, f: &Tensor<D>) -> Tensor<D>;

    /// Directional derivative of [`stress`](Self::stress) at `f` in direction `df`.
    fn differential(&self, f: &Tensor<D>, df: &Tensor<D>) -> Tensor<D>;

    /// Human-readable model name.
    fn name(&self) -> &str;
}

/// Lamé parameters (λ, μ) shared by the isotropic models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LameParameters {
    /// First Lamé parameter λ [Pa]
    pub lambda: f64,
    /// Shear modulus μ [Pa]
    pub mu: f64,
}

impl LameParameters {
    /// Parse a `[lambda, mu]` coefficient array.
    pub fn from_coefficients(coefficients: &[f64]) -> Result<Self> {
        let [lambda, mu] = coefficients else {
            return Err(SolverError::Material(format!(
                "expected [lambda, mu], got {} values",
                coefficients.len()
            )));
        };
        Self::new(*lambda, *mu)
    }

    /// Checked constructor.
    pub fn new(lambda: f64, mu: f64) -> Result<Self> {
        if !lambda.is_finite() || !mu.is_finite() {
            return Err(SolverError::Material(format!(
                "non-finite Lamé parameters (lambda = {lambda}, mu = {mu})"
            )));
        }
        if mu <= 0.0 {
            return Err(SolverError::Material(format!(
                "shear modulus must be positive, got {mu}"
            )));
        }
        Ok(Self { lambda, mu })
    }

    /// Convert Young's modulus E and Poisson's ratio ν.
    ///
    /// μ = E / (2(1 + ν)), λ = Eν / ((1 + ν)(1 − 2ν))
    pub fn from_youngs_poisson(youngs_modulus: f64, poissons_ratio: f64) -> Result<Self> {
        let nu = poissons_ratio;
        if !(-1.0 < nu && nu < 0.5) {
            return Err(SolverError::Material(format!(
                "Poisson's ratio must lie in (-1, 0.5), got {nu}"
            )));
        }
        let mu = youngs_modulus / (2.0 * (1.0 + nu));
        let lambda = youngs_modulus * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        Self::new(lambda, mu)
    }

    /// Bulk modulus K = λ + 2μ/3
    pub fn bulk_modulus(&self) -> f64 {
        self.lambda + 2.0 * self.mu / 3.0
    }

    /// Coefficient array accepted by [`HyperelasticModel::from_coefficients`].
    pub fn coefficients(&self) -> [f64; 2] {
        [self.lambda, self.mu]
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Finite-difference helpers shared by the model tests.

    use super::{HyperelasticModel, Tensor};

    /// Central-difference approximation of ∂ψ/∂F.
    pub fn numerical_stress<const D: usize, M: HyperelasticModel<D>>(
        model: &M,
        f: &Tensor<D>,
        eps: f64,
    ) -> Tensor<D> {
        let mut p = Tensor::<D>::zeros();
        for i in 0..D {
            for j in 0..D {
                let mut fp = *f;
                let mut fm = *f;
                fp[(i, j)] += eps;
                fm[(i, j)] -= eps;
                p[(i, j)] = (model.energy(&fp) - model.energy(&fm)) / (2.0 * eps);
            }
        }
        p
    }

    /// Forward-difference approximation of dP in direction `df`.
    pub fn forward_differential<const D: usize, M: HyperelasticModel<D>>(
        model: &M,
        f: &Tensor<D>,
        df: &Tensor<D>,
        eps: f64,
    ) -> Tensor<D> {
        (model.stress(&(f + df * eps)) - model.stress(f)) / eps
    }

    pub fn sample_gradient_2d() -> Tensor<2> {
        Tensor::<2>::new(1.1, 0.2, -0.05, 0.93)
    }

    pub fn sample_gradient_3d() -> Tensor<3> {
        Tensor::<3>::new(1.05, 0.1, -0.02, 0.03, 0.97, 0.08, -0.06, 0.04, 1.12)
    }

    pub fn sample_direction_3d() -> Tensor<3> {
        Tensor::<3>::new(0.3, -0.1, 0.2, 0.05, 0.4, -0.25, 0.1, 0.15, -0.2)
    }
}
