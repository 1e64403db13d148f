//! Composed structural response: nodal force → modal force → modal
//! displacement → nodal displacement.
//!
//! [`ModalChain`] wires the three operators together for one coupling
//! iteration and runs them in primal, tangent and adjoint mode. The
//! mode-shape matrix may be a partition-local column slice; projections are
//! then summed across partitions through the [`Communicator`], while the
//! reconstruction only touches local nodes.
//!
//! Differentiable inputs are the nodal force `f_s` and the modal stiffness
//! `k`. Mode shapes are held fixed.

use nalgebra::{DMatrix, DVector};

use crate::comm::{Communicator, SelfComm};
use crate::decomposition::ModalBasis;
use crate::equilibrium::EquilibriumSolver;
use crate::error::{Result, check_len};
use crate::projection::{project_force, project_force_fwd, project_force_rev};
use crate::reconstruction::{reconstruct, reconstruct_fwd, reconstruct_rev};

/// Primal quantities of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalState {
    /// Nodal force (local partition)
    pub f_s: DVector<f64>,
    /// Modal force
    pub mf: DVector<f64>,
    /// Modal displacement
    pub z: DVector<f64>,
    /// Nodal displacement (local partition)
    pub u_s: DVector<f64>,
}

/// Forward-mode tangents of the chain outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalTangent {
    pub mf: DVector<f64>,
    pub z: DVector<f64>,
    pub u_s: DVector<f64>,
}

/// Reverse-mode adjoints of the chain inputs and intermediates.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalAdjoint {
    /// Adjoint of the nodal force (local partition)
    pub f_s: DVector<f64>,
    /// Adjoint of the modal stiffness
    pub k: DVector<f64>,
    /// Adjoint of the modal force
    pub mf: DVector<f64>,
    /// Adjoint of the modal displacement
    pub z: DVector<f64>,
}

pub struct ModalChain<'a, C: Communicator = SelfComm> {
    mode_shape: &'a DMatrix<f64>,
    k: &'a DVector<f64>,
    equilibrium: EquilibriumSolver,
    comm: C,
}

impl<'a> ModalChain<'a, SelfComm> {
    /// Serial chain over a full basis.
    pub fn new(basis: &'a ModalBasis) -> Self {
        Self {
            mode_shape: &basis.mode_shape,
            k: &basis.modal_stiffness,
            equilibrium: EquilibriumSolver::default(),
            comm: SelfComm,
        }
    }
}

impl<'a, C: Communicator> ModalChain<'a, C> {
    /// Chain over a partition-local mode-shape slice.
    pub fn partitioned(
        local_mode_shape: &'a DMatrix<f64>,
        modal_stiffness: &'a DVector<f64>,
        comm: C,
    ) -> Result<Self> {
        check_len("modal stiffness", local_mode_shape.nrows(), modal_stiffness.len())?;
        Ok(Self {
            mode_shape: local_mode_shape,
            k: modal_stiffness,
            equilibrium: EquilibriumSolver::default(),
            comm,
        })
    }

    pub fn with_singular_tolerance(mut self, tolerance: f64) -> Self {
        self.equilibrium = EquilibriumSolver::new(tolerance);
        self
    }

    pub fn nmodes(&self) -> usize {
        self.mode_shape.nrows()
    }

    /// Length of the local nodal vectors.
    pub fn local_size(&self) -> usize {
        self.mode_shape.ncols()
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    fn reduce(&self, mut partial: DVector<f64>) -> Result<DVector<f64>> {
        self.comm.all_reduce_sum(partial.as_mut_slice())?;
        Ok(partial)
    }

    /// Modal force summed over all partitions.
    pub fn modal_force(&self, f_s: &DVector<f64>) -> Result<DVector<f64>> {
        self.reduce(project_force(self.mode_shape, f_s)?)
    }

    pub fn evaluate(&self, f_s: &DVector<f64>) -> Result<ModalState> {
        let mf = self.modal_force(f_s)?;
        let z = self.equilibrium.solve(self.k, &mf)?;
        let u_s = reconstruct(self.mode_shape, &z)?;
        Ok(ModalState {
            f_s: f_s.clone(),
            mf,
            z,
            u_s,
        })
    }

    /// Propagate tangents `d_f_s` (local) and optionally `d_k`.
    pub fn jvp(
        &self,
        state: &ModalState,
        d_f_s: &DVector<f64>,
        d_k: Option<&DVector<f64>>,
    ) -> Result<ModalTangent> {
        let d_mf = self.reduce(project_force_fwd(self.mode_shape, d_f_s)?)?;
        let d_z = self
            .equilibrium
            .solve_fwd(self.k, &state.mf, Some(&d_mf), d_k)?;
        let d_u_s = reconstruct_fwd(self.mode_shape, &d_z)?;
        Ok(ModalTangent {
            mf: d_mf,
            z: d_z,
            u_s: d_u_s,
        })
    }

    /// Pull an adjoint seed on the local nodal displacement back to the
    /// inputs.
    pub fn vjp(&self, state: &ModalState, u_s_bar: &DVector<f64>) -> Result<ModalAdjoint> {
        let n = self.nmodes();

        let mut z_bar = DVector::zeros(n);
        reconstruct_rev(self.mode_shape, u_s_bar, &mut z_bar)?;
        let z_bar = self.reduce(z_bar)?;

        let mut mf_bar = DVector::zeros(n);
        let mut k_bar = DVector::zeros(n);
        self.equilibrium.solve_rev(
            self.k,
            &state.mf,
            &z_bar,
            Some(&mut mf_bar),
            Some(&mut k_bar),
        )?;

        let mut f_s_bar = DVector::zeros(self.local_size());
        project_force_rev(self.mode_shape, &mf_bar, &mut f_s_bar)?;

        Ok(ModalAdjoint {
            f_s: f_s_bar,
            k: k_bar,
            mf: mf_bar,
            z: z_bar,
        })
    }
}
