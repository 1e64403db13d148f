//! Modal structural solver as seen by a coupling framework.
//!
//! [`ModalStructure`] owns the full model (through a lazily built
//! [`ModelHandle`]) and the decomposer, reports the sizes the framework
//! needs to allocate its variables, and hands out a [`ModalChain`] bound to
//! each freshly computed basis.
//!
//! ```text
//! design vars ─▶ decompose ─▶ ModalBasis { x_s0, mode_shape, modal_mass, modal_stiffness }
//!                                  │
//!            f_s ─▶ chain(&basis): modal force ─▶ modal solve ─▶ u_s
//! ```

use modal_model::{ModelHandle, StructuralModel, TRANSLATIONAL_DOFS};

use crate::backend::EigenSolver;
use crate::chain::ModalChain;
use crate::comm::SelfComm;
use crate::config::ModalConfig;
use crate::decomposition::{ModalBasis, ModalDecomposer};
use crate::error::Result;

pub struct ModalStructure<M> {
    model: ModelHandle<M>,
    decomposer: ModalDecomposer,
}

impl<M: StructuralModel> ModalStructure<M> {
    pub fn new(model: ModelHandle<M>, config: ModalConfig) -> Result<Self> {
        Ok(Self {
            model,
            decomposer: ModalDecomposer::new(config)?,
        })
    }

    pub fn with_solver(
        model: ModelHandle<M>,
        config: ModalConfig,
        solver: Box<dyn EigenSolver>,
    ) -> Result<Self> {
        Ok(Self {
            model,
            decomposer: ModalDecomposer::with_solver(config, solver)?,
        })
    }

    pub fn config(&self) -> &ModalConfig {
        self.decomposer.config()
    }

    pub fn nmodes(&self) -> usize {
        self.decomposer.nmodes()
    }

    /// DOFs per node carried by the modal vectors (translations only).
    pub fn ndof(&self) -> usize {
        TRANSLATIONAL_DOFS
    }

    /// Number of structural design variables.
    pub fn ndv(&self) -> Result<usize> {
        Ok(self.model.lock()?.design_var_count())
    }

    pub fn nnodes(&self) -> Result<usize> {
        Ok(self.model.lock()?.node_count())
    }

    /// `(nmodes, 3·Nn)`: shape of the mode-shape matrix.
    pub fn modal_sizes(&self) -> Result<(usize, usize)> {
        Ok((self.nmodes(), self.nnodes()? * TRANSLATIONAL_DOFS))
    }

    /// Decompose the model at a new design point.
    ///
    /// The model lock is held for the whole decomposition so concurrent
    /// callers cannot interleave design-variable updates.
    pub fn decompose(&self, design_vars: &[f64]) -> Result<ModalBasis> {
        let mut model = self.model.lock()?;
        self.decomposer.decompose(&mut *model, design_vars)
    }

    /// Force → displacement chain bound to `basis`.
    pub fn chain<'a>(&self, basis: &'a ModalBasis) -> ModalChain<'a, SelfComm> {
        ModalChain::new(basis).with_singular_tolerance(self.config().singular_tolerance)
    }
}

impl<M> std::fmt::Debug for ModalStructure<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalStructure")
            .field("model", &self.model)
            .field("decomposer", &self.decomposer)
            .finish()
    }
}
