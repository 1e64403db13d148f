//! Galerkin projection of nodal forces onto the modal basis.
//!
//! ```text
//! mf[i] = Σ_j mode_shape[i, j] * f_s[j]
//! ```
//!
//! The mode shapes are constants of the linearization, so the tangent map
//! is the same matrix and the adjoint map is its transpose.

use nalgebra::{DMatrix, DVector};

use crate::derivatives::{JacMode, LinearOperator, check_apply};
use crate::error::{Result, check_len};

/// Modal force `mode_shape * f_s`.
pub fn project_force(mode_shape: &DMatrix<f64>, f_s: &DVector<f64>) -> Result<DVector<f64>> {
    check_len("f_s", mode_shape.ncols(), f_s.len())?;
    Ok(mode_shape * f_s)
}

/// Tangent of the modal force for a nodal force perturbation `d_f_s`.
pub fn project_force_fwd(
    mode_shape: &DMatrix<f64>,
    d_f_s: &DVector<f64>,
) -> Result<DVector<f64>> {
    project_force(mode_shape, d_f_s)
}

/// Accumulate `f_s_bar += mode_shapeᵀ * mf_bar`.
pub fn project_force_rev(
    mode_shape: &DMatrix<f64>,
    mf_bar: &DVector<f64>,
    f_s_bar: &mut DVector<f64>,
) -> Result<()> {
    check_len("mf adjoint", mode_shape.nrows(), mf_bar.len())?;
    check_len("f_s adjoint", mode_shape.ncols(), f_s_bar.len())?;
    f_s_bar.gemv_tr(1.0, mode_shape, mf_bar, 1.0);
    Ok(())
}

/// [`LinearOperator`] view of the projection: `f_s ↦ mf`.
#[derive(Debug, Clone, Copy)]
pub struct ForceProjector<'a> {
    mode_shape: &'a DMatrix<f64>,
}

impl<'a> ForceProjector<'a> {
    pub fn new(mode_shape: &'a DMatrix<f64>) -> Self {
        Self { mode_shape }
    }

    pub fn mode_shape(&self) -> &'a DMatrix<f64> {
        self.mode_shape
    }
}

impl LinearOperator for ForceProjector<'_> {
    fn input_len(&self) -> usize {
        self.mode_shape.ncols()
    }

    fn output_len(&self) -> usize {
        self.mode_shape.nrows()
    }

    fn apply(&self, mode: JacMode, x: &DVector<f64>, y: &mut DVector<f64>) -> Result<()> {
        check_apply(self, mode, x, y)?;
        match mode {
            JacMode::Forward => y.gemv(1.0, self.mode_shape, x, 1.0),
            JacMode::Reverse => y.gemv_tr(1.0, self.mode_shape, x, 1.0),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModalError;
    use approx::assert_relative_eq;

    #[test]
    fn projects_onto_each_mode() {
        let mode_shape = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, -1.0, 1.0]);
        let f_s = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let mf = project_force(&mode_shape, &f_s).unwrap();
        assert_relative_eq!(mf[0], 7.0);
        assert_relative_eq!(mf[1], 1.0);
    }

    #[test]
    fn reverse_accumulates() {
        let mode_shape = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let mut f_s_bar = DVector::from_vec(vec![1.0, 1.0]);
        project_force_rev(&mode_shape, &DVector::from_vec(vec![1.0, 0.0]), &mut f_s_bar).unwrap();
        assert_eq!(f_s_bar.as_slice(), &[2.0, 3.0]);
        project_force_rev(&mode_shape, &DVector::from_vec(vec![0.0, 1.0]), &mut f_s_bar).unwrap();
        assert_eq!(f_s_bar.as_slice(), &[5.0, 7.0]);
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mode_shape = DMatrix::zeros(2, 6);
        let err = project_force(&mode_shape, &DVector::zeros(5)).unwrap_err();
        assert!(matches!(
            err,
            ModalError::DimensionMismatch { expected: 6, actual: 5, .. }
        ));

        let mut f_s_bar = DVector::zeros(6);
        assert!(project_force_rev(&mode_shape, &DVector::zeros(3), &mut f_s_bar).is_err());
    }

    #[test]
    fn operator_view_matches_free_functions() {
        let mode_shape = DMatrix::from_row_slice(2, 3, &[0.5, 1.0, -2.0, 3.0, 0.0, 1.5]);
        let op = ForceProjector::new(&mode_shape);
        let d = DVector::from_vec(vec![1.0, -1.0, 2.0]);
        assert_eq!(
            op.apply_new(JacMode::Forward, &d).unwrap(),
            project_force_fwd(&mode_shape, &d).unwrap()
        );
    }
}
