//! Compressible Neo-Hookean material.
//!
//! ```text
//! ψ(F)     = μ/2 (tr(FᵀF) − d) − μ ln J + λ/2 (ln J)²
//! P(F)     = μ (F − F⁻ᵀ) + λ ln J F⁻ᵀ
//! dP(F;dF) = μ dF + (μ − λ ln J) F⁻ᵀ dFᵀ F⁻ᵀ + λ tr(F⁻¹ dF) F⁻ᵀ
//! ```
//!
//! with J = det F. The energy is infinite or NaN for J ≤ 0, and the stress is
//! NaN when F is singular.

use super::{HyperelasticModel, LameParameters, Tensor, determinant};
use crate::error::Result;

/// Compressible Neo-Hookean model in `D` dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeoHookean<const D: usize> {
    pub lame: LameParameters,
}

impl<const D: usize> NeoHookean<D> {
    pub fn new(lame: LameParameters) -> Self {
        Self { lame }
    }

    fn inverse(f: &Tensor<D>) -> Tensor<D> {
        f.try_inverse()
            .unwrap_or_else(|| Tensor::<D>::from_element(f64::NAN))
    }
}

impl<const D: usize> HyperelasticModel<D> for NeoHookean<D> {
    fn from_coefficients(coefficients: &[f64]) -> Result<Self> {
        Ok(Self::new(LameParameters::from_coefficients(coefficients)?))
    }

    fn energy(&self, f: &Tensor<D>) -> f64 {
        let LameParameters { lambda, mu } = self.lame;
        let log_j = determinant(f).ln();
        0.5 * mu * (f.norm_squared() - D as f64) - mu * log_j + 0.5 * lambda * log_j * log_j
    }

    fn stress(&self, f: &Tensor<D>) -> Tensor<D> {
        let LameParameters { lambda, mu } = self.lame;
        let f_inv_t = Self::inverse(f).transpose();
        let log_j = determinant(f).ln();
        (f - f_inv_t) * mu + f_inv_t * (lambda * log_j)
    }

    fn differential(&self, f: &Tensor<D>, df: &Tensor<D>) -> Tensor<D> {
        let LameParameters { lambda, mu } = self.lame;
        let f_inv = Self::inverse(f);
        let f_inv_t = f_inv.transpose();
        let log_j = determinant(f).ln();
        let d_log_j = (f_inv * df).trace();
        df * mu + (f_inv_t * df.transpose() * f_inv_t) * (mu - lambda * log_j)
            + f_inv_t * (lambda * d_log_j)
    }

    fn name(&self) -> &str {
        "neo-hookean"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::testing::*;

    fn model_3d() -> NeoHookean<3> {
        NeoHookean::from_coefficients(&[1.3, 0.8]).unwrap()
    }

    #[test]
    fn reference_state_is_stress_free() {
        let model = model_3d();
        let identity = Tensor::<3>::identity();
        assert!(model.energy(&identity).abs() < 1e-14);
        assert!(model.stress(&identity).norm() < 1e-14);

        let model = NeoHookean::<2>::from_coefficients(&[1.3, 0.8]).unwrap();
        assert!(model.energy(&Tensor::<2>::identity()).abs() < 1e-14);
        assert!(model.stress(&Tensor::<2>::identity()).norm() < 1e-14);
    }

    #[test]
    fn stress_matches_energy_gradient() {
        let model = model_3d();
        let f = sample_gradient_3d();
        let p = model.stress(&f);
        let p_fd = numerical_stress(&model, &f, 1e-6);
        assert!((p - p_fd).norm() < 1e-7, "|P - P_fd| = {}", (p - p_fd).norm());

        let model = NeoHookean::<2>::from_coefficients(&[3.0, 0.5]).unwrap();
        let f = sample_gradient_2d();
        let p_fd = numerical_stress(&model, &f, 1e-6);
        assert!((model.stress(&f) - p_fd).norm() < 1e-7);
    }

    #[test]
    fn differential_matches_finite_differences() {
        let model = model_3d();
        let f = sample_gradient_3d();
        let df = sample_direction_3d();
        let dp = model.differential(&f, &df);

        // Forward differences converge at first order in eps.
        let err_coarse = (forward_differential(&model, &f, &df, 1e-3) - dp).norm();
        let err_fine = (forward_differential(&model, &f, &df, 1e-4) - dp).norm();
        assert!(err_fine < 1e-2);
        assert!(err_fine < 0.2 * err_coarse, "{err_fine} vs {err_coarse}");
    }

    #[test]
    fn differential_is_symmetric() {
        // A : dP(B) == B : dP(A) for a potential-derived stress
        let model = model_3d();
        let f = sample_gradient_3d();
        let a = sample_direction_3d();
        let b = Tensor::<3>::new(-0.2, 0.1, 0.05, 0.3, 0.0, 0.12, -0.4, 0.2, 0.25);
        let ab = a.dot(&model.differential(&f, &b));
        let ba = b.dot(&model.differential(&f, &a));
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn inverted_gradient_has_non_finite_energy() {
        let model = model_3d();
        let inverted = Tensor::<3>::from_diagonal(&nalgebra::Vector3::new(1.0, 1.0, -0.5));
        assert!(!model.energy(&inverted).is_finite());

        let collapsed = Tensor::<3>::from_diagonal(&nalgebra::Vector3::new(1.0, 1.0, 0.0));
        assert!(!model.energy(&collapsed).is_finite());
        assert!(model.stress(&collapsed).iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn uniaxial_stretch_is_tensile() {
        let model = model_3d();
        let f = Tensor::<3>::from_diagonal(&nalgebra::Vector3::new(1.1, 1.0, 1.0));
        let p = model.stress(&f);
        assert!(p[(0, 0)] > 0.0);
        assert!(model.energy(&f) > 0.0);
    }
}
