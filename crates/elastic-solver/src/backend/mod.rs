//! Numerical backend abstraction layer.
//!
//! The drivers only need one operation from a backend: solve the assembled
//! tangent system for a Newton direction. Keeping it behind a trait lets a
//! distributed backend replace the dense native one without touching the
//! drivers.
//!
//! ```text
//! Element Kernel (nalgebra SMatrix, per point)
//!         │
//!         ▼
//! Assembly (COO → CSR tangent, DVector residual)
//!         │
//!         ▼
//! LinearSolver ── NativeBackend (dense LU)
//! ```

pub mod native;
pub mod traits;

pub use native::NativeBackend;
pub use traits::*;

/// Backend used when none is set explicitly.
pub fn default_backend() -> Box<dyn LinearSolver> {
    Box::new(NativeBackend)
}
