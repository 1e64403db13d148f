//! Full finite-element model interface for the modal structural solver.
//!
//! The reduced-order solver never assembles finite elements itself. It talks
//! to a [`StructuralModel`], which owns the mesh and knows how to build the
//! stiffness and mass operators for a given design-variable vector.
//!
//! This crate provides:
//! - [`StructuralModel`]: the capability the modal decomposer consumes
//! - [`SpringLattice`]: a small 3-D bar lattice on an elastic foundation,
//!   usable wherever no external assembly is available
//! - [`ModelHandle`]: an owned, lazily constructed model with serialized
//!   access for design-variable updates

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

pub mod handle;
pub mod lattice;

pub use handle::ModelHandle;
pub use lattice::{Bar, LatticeProperties, SpringLattice};

/// Number of translational degrees of freedom carried into the modal basis.
pub const TRANSLATIONAL_DOFS: usize = 3;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Design variable count mismatch: expected {expected}, got {actual}")]
    DesignVarCount { expected: usize, actual: usize },

    #[error("Model initialization failed: {0}")]
    Initialization(String),

    #[error("Model lock poisoned by a panicked holder")]
    Poisoned,
}

/// Which global operator to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixKind {
    /// Stiffness matrix K(dv)
    Stiffness,
    /// Mass matrix M (design-variable independent)
    Mass,
}

/// A finite-element assembly parameterized by design variables.
///
/// Global DOF numbering is node-major: DOF `d` of node `n` lives at
/// `n * dofs_per_node() + d`, with the three translations first.
pub trait StructuralModel {
    /// Number of nodes in the model.
    fn node_count(&self) -> usize;

    /// Degrees of freedom per node (at least 3).
    fn dofs_per_node(&self) -> usize;

    /// Length of the design-variable vector.
    fn design_var_count(&self) -> usize;

    /// Store new design variables. Subsequent assemblies use them.
    fn set_design_vars(&mut self, design_vars: &[f64]) -> Result<()>;

    /// Assemble a global operator of size `num_dofs() × num_dofs()`.
    fn assemble(&self, kind: MatrixKind) -> Result<CsrMatrix<f64>>;

    /// Undeformed nodal coordinates, `[x0, y0, z0, x1, ...]`.
    fn undeformed_coordinates(&self) -> DVector<f64>;

    /// Global DOF indices held at zero displacement.
    fn constrained_dofs(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Total number of DOFs in the full model.
    fn num_dofs(&self) -> usize {
        self.node_count() * self.dofs_per_node()
    }
}

impl<M: StructuralModel + ?Sized> StructuralModel for Box<M> {
    fn node_count(&self) -> usize {
        (**self).node_count()
    }

    fn dofs_per_node(&self) -> usize {
        (**self).dofs_per_node()
    }

    fn design_var_count(&self) -> usize {
        (**self).design_var_count()
    }

    fn set_design_vars(&mut self, design_vars: &[f64]) -> Result<()> {
        (**self).set_design_vars(design_vars)
    }

    fn assemble(&self, kind: MatrixKind) -> Result<CsrMatrix<f64>> {
        (**self).assemble(kind)
    }

    fn undeformed_coordinates(&self) -> DVector<f64> {
        (**self).undeformed_coordinates()
    }

    fn constrained_dofs(&self) -> Vec<usize> {
        (**self).constrained_dofs()
    }
}
