//! Generalized eigensolver backend layer.
//!
//! The modal decomposer only depends on the [`EigenSolver`] trait, so the
//! numerical method behind it can be swapped without touching the rest of
//! the chain.
//!
//! # Backends
//!
//! - **Dense** (default): nalgebra Cholesky + symmetric eigen decomposition.
//!   Direct, no convergence parameters. Suitable for small-to-medium models.
//! - **ShiftInvert**: block subspace iteration on `(K - s*M)^-1 * M` with a
//!   residual tolerance and an iteration budget.
//!
//! ```text
//! StructuralModel ──assemble──▶ EigenSystemData (CSR K, M, free DOFs)
//!                                      │
//!                                      ▼
//!                           EigenSolver::solve_generalized
//!                              ┌───────┴───────┐
//!                              ▼               ▼
//!                            Dense        ShiftInvert
//! ```

pub mod dense;
pub mod shift_invert;
pub mod traits;

pub use dense::DenseEigenSolver;
pub use shift_invert::ShiftInvertSolver;
pub use traits::*;

use crate::config::{EigenBackend, EigenConfig};

/// Returns the default eigensolver backend.
pub fn default_backend() -> Box<dyn EigenSolver> {
    Box::new(DenseEigenSolver)
}

/// Builds the backend selected by an [`EigenConfig`].
pub fn backend_for(config: &EigenConfig) -> Box<dyn EigenSolver> {
    match config.backend {
        EigenBackend::Dense => Box::new(DenseEigenSolver),
        EigenBackend::ShiftInvert => Box::new(ShiftInvertSolver::new(
            config.max_iterations,
            config.subspace_size,
        )),
    }
}
