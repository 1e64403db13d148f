//! Steady modal equilibrium.
//!
//! The modal stiffness matrix is diagonal, so the reduced system
//! `K z - mf = 0` decouples into `k[i] * z[i] = mf[i]` per mode.
//!
//! Partials of `z = mf / k`:
//!
//! ```text
//! dz/dmf = 1 / k
//! dz/dk  = -mf / k²
//! ```
//!
//! A zero (or numerically zero) modal stiffness means a rigid or unstable
//! mode reached the solver. Each mode is judged on its own value. That is an upstream modeling error and is
//! reported, never regularized. Negative stiffness is accepted.

use nalgebra::DVector;

use crate::derivatives::{JacMode, LinearOperator, check_apply};
use crate::error::{ModalError, Result, check_len};

pub const DEFAULT_SINGULAR_TOLERANCE: f64 = 1e-12;

/// Modal displacement `z[i] = mf[i] / k[i]` with the default tolerance.
pub fn solve(k: &DVector<f64>, mf: &DVector<f64>) -> Result<DVector<f64>> {
    EquilibriumSolver::default().solve(k, mf)
}

/// Diagonal modal solver with a configurable singularity threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumSolver {
    /// |k[i]| <= singular_tolerance (or non-finite) is singular
    pub singular_tolerance: f64,
}

impl Default for EquilibriumSolver {
    fn default() -> Self {
        Self {
            singular_tolerance: DEFAULT_SINGULAR_TOLERANCE,
        }
    }
}

impl EquilibriumSolver {
    pub fn new(singular_tolerance: f64) -> Self {
        Self { singular_tolerance }
    }

    fn check_stiffness(&self, k: &DVector<f64>) -> Result<()> {
        match k
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || v.abs() <= self.singular_tolerance)
        {
            Some((mode, &value)) => Err(ModalError::SingularModalStiffness { mode, value }),
            None => Ok(()),
        }
    }

    pub fn solve(&self, k: &DVector<f64>, mf: &DVector<f64>) -> Result<DVector<f64>> {
        check_len("mf", k.len(), mf.len())?;
        self.check_stiffness(k)?;
        Ok(mf.component_div(k))
    }

    /// Tangent `dz = d_mf / k - mf / k² * d_k`.
    ///
    /// A `None` tangent is treated as zero, matching an input that is not
    /// being differentiated.
    pub fn solve_fwd(
        &self,
        k: &DVector<f64>,
        mf: &DVector<f64>,
        d_mf: Option<&DVector<f64>>,
        d_k: Option<&DVector<f64>>,
    ) -> Result<DVector<f64>> {
        check_len("mf", k.len(), mf.len())?;
        self.check_stiffness(k)?;

        let mut d_z = DVector::zeros(k.len());
        if let Some(d_mf) = d_mf {
            check_len("mf tangent", k.len(), d_mf.len())?;
            d_z += d_mf.component_div(k);
        }
        if let Some(d_k) = d_k {
            check_len("k tangent", k.len(), d_k.len())?;
            for i in 0..k.len() {
                d_z[i] -= mf[i] / (k[i] * k[i]) * d_k[i];
            }
        }
        Ok(d_z)
    }

    /// Accumulate `mf_bar += z_bar / k` and `k_bar += -mf / k² * z_bar`.
    ///
    /// Only the adjoint buffers that are passed in are updated.
    pub fn solve_rev(
        &self,
        k: &DVector<f64>,
        mf: &DVector<f64>,
        z_bar: &DVector<f64>,
        mf_bar: Option<&mut DVector<f64>>,
        k_bar: Option<&mut DVector<f64>>,
    ) -> Result<()> {
        check_len("mf", k.len(), mf.len())?;
        check_len("z adjoint", k.len(), z_bar.len())?;
        self.check_stiffness(k)?;

        if let Some(mf_bar) = mf_bar {
            check_len("mf adjoint", k.len(), mf_bar.len())?;
            *mf_bar += z_bar.component_div(k);
        }
        if let Some(k_bar) = k_bar {
            check_len("k adjoint", k.len(), k_bar.len())?;
            for i in 0..k.len() {
                k_bar[i] += -mf[i] / (k[i] * k[i]) * z_bar[i];
            }
        }
        Ok(())
    }

    /// Linearization at `(k, mf)` as a [`LinearOperator`] on `[mf; k] ↦ z`.
    pub fn linearize<'a>(
        &self,
        k: &'a DVector<f64>,
        mf: &'a DVector<f64>,
    ) -> Result<EquilibriumLinearization<'a>> {
        check_len("mf", k.len(), mf.len())?;
        self.check_stiffness(k)?;
        Ok(EquilibriumLinearization {
            solver: *self,
            k,
            mf,
        })
    }
}

/// Jacobian of `z = mf / k` with inputs stacked as `[mf; k]`.
#[derive(Debug, Clone, Copy)]
pub struct EquilibriumLinearization<'a> {
    solver: EquilibriumSolver,
    k: &'a DVector<f64>,
    mf: &'a DVector<f64>,
}

impl LinearOperator for EquilibriumLinearization<'_> {
    fn input_len(&self) -> usize {
        2 * self.k.len()
    }

    fn output_len(&self) -> usize {
        self.k.len()
    }

    fn apply(&self, mode: JacMode, x: &DVector<f64>, y: &mut DVector<f64>) -> Result<()> {
        check_apply(self, mode, x, y)?;
        let n = self.k.len();
        match mode {
            JacMode::Forward => {
                let d_mf = x.rows(0, n).into_owned();
                let d_k = x.rows(n, n).into_owned();
                *y += self
                    .solver
                    .solve_fwd(self.k, self.mf, Some(&d_mf), Some(&d_k))?;
            }
            JacMode::Reverse => {
                let mut mf_bar = y.rows(0, n).into_owned();
                let mut k_bar = y.rows(n, n).into_owned();
                self.solver.solve_rev(
                    self.k,
                    self.mf,
                    x,
                    Some(&mut mf_bar),
                    Some(&mut k_bar),
                )?;
                y.rows_mut(0, n).copy_from(&mf_bar);
                y.rows_mut(n, n).copy_from(&k_bar);
            }
        }
        Ok(())
    }
}
