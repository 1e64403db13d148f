//! Expansion of modal displacements back to nodal displacements.
//!
//! ```text
//! u_s[j] = Σ_i mode_shape[i, j] * z[i]
//! ```
//!
//! This is the transpose of the force projection and uses the very same
//! mode-shape buffer, so work done by modal forces equals work done by the
//! nodal forces on the reconstructed displacements.

use nalgebra::{DMatrix, DVector};

use crate::derivatives::{JacMode, LinearOperator, check_apply};
use crate::error::{Result, check_len};

/// Nodal displacement `mode_shapeᵀ * z`.
pub fn reconstruct(mode_shape: &DMatrix<f64>, z: &DVector<f64>) -> Result<DVector<f64>> {
    check_len("z", mode_shape.nrows(), z.len())?;
    Ok(mode_shape.tr_mul(z))
}

/// Tangent of the nodal displacement for a modal perturbation `d_z`.
pub fn reconstruct_fwd(mode_shape: &DMatrix<f64>, d_z: &DVector<f64>) -> Result<DVector<f64>> {
    reconstruct(mode_shape, d_z)
}

/// Accumulate `z_bar += mode_shape * u_s_bar`.
pub fn reconstruct_rev(
    mode_shape: &DMatrix<f64>,
    u_s_bar: &DVector<f64>,
    z_bar: &mut DVector<f64>,
) -> Result<()> {
    check_len("u_s adjoint", mode_shape.ncols(), u_s_bar.len())?;
    check_len("z adjoint", mode_shape.nrows(), z_bar.len())?;
    z_bar.gemv(1.0, mode_shape, u_s_bar, 1.0);
    Ok(())
}

/// [`LinearOperator`] view of the reconstruction: `z ↦ u_s`.
#[derive(Debug, Clone, Copy)]
pub struct DisplacementReconstructor<'a> {
    mode_shape: &'a DMatrix<f64>,
}

impl<'a> DisplacementReconstructor<'a> {
    pub fn new(mode_shape: &'a DMatrix<f64>) -> Self {
        Self { mode_shape }
    }
}

impl LinearOperator for DisplacementReconstructor<'_> {
    fn input_len(&self) -> usize {
        self.mode_shape.nrows()
    }

    fn output_len(&self) -> usize {
        self.mode_shape.ncols()
    }

    fn apply(&self, mode: JacMode, x: &DVector<f64>, y: &mut DVector<f64>) -> Result<()> {
        check_apply(self, mode, x, y)?;
        match mode {
            JacMode::Forward => y.gemv_tr(1.0, self.mode_shape, x, 1.0),
            JacMode::Reverse => y.gemv(1.0, self.mode_shape, x, 1.0),
        }
        Ok(())
    }
}
