//! St. Venant–Kirchhoff material.
//!
//! Linear isotropic law in terms of the Green–Lagrange strain:
//! E = (FᵀF − I)/2, S = λ tr(E) I + 2μE, P = F S.
//! Stays finite under inversion, so it relies on the determinant check of
//! the objective guard rather than on a blow-up of the energy.

use super::{HyperelasticModel, LameParameters, Tensor};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StVenantKirchhoff<const D: usize> {
    pub lame: LameParameters,
}

impl<const D: usize> StVenantKirchhoff<D> {
    pub fn new(lame: LameParameters) -> Self {
        Self { lame }
    }

    fn green_strain(f: &Tensor<D>) -> Tensor<D> {
        (f.tr_mul(f) - Tensor::<D>::identity()) * 0.5
    }

    fn second_piola(&self, e: &Tensor<D>) -> Tensor<D> {
        Tensor::<D>::identity() * (self.lame.lambda * e.trace()) + e * (2.0 * self.lame.mu)
    }
}

impl<const D: usize> HyperelasticModel<D> for StVenantKirchhoff<D> {
    fn from_coefficients(coefficients: &[f64]) -> Result<Self> {
        Ok(Self::new(LameParameters::from_coefficients(coefficients)?))
    }

    fn energy(&self, f: &Tensor<D>) -> f64 {
        let e = Self::green_strain(f);
        let tr = e.trace();
        0.5 * self.lame.lambda * tr * tr + self.lame.mu * e.norm_squared()
    }

    fn stress(&self, f: &Tensor<D>) -> Tensor<D> {
        f * self.second_piola(&Self::green_strain(f))
    }

    fn differential(&self, f: &Tensor<D>, df: &Tensor<D>) -> Tensor<D> {
        let s = self.second_piola(&Self::green_strain(f));
        let de = (df.tr_mul(f) + f.tr_mul(df)) * 0.5;
        df * s + f * self.second_piola(&de)
    }

    fn name(&self) -> &str {
        "st-venant-kirchhoff"
    }
}
