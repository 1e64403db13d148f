//! Reduced-order modal structural solver.
//!
//! Extracts a small set of vibration modes from a full finite-element
//! model and carries the structural response of a fluid-structure coupling
//! loop in that modal subspace:
//!
//! ```text
//! design vars ─▶ decomposition ─▶ mode_shape, modal_stiffness, x_s0
//! f_s ─▶ projection ─▶ mf ─▶ equilibrium ─▶ z ─▶ reconstruction ─▶ u_s
//! ```
//!
//! Every operator comes with a forward (tangent) and reverse (adjoint)
//! rule, so gradients can be propagated through the structural response
//! without differentiating the full model. Mode shapes are treated as
//! constants by those rules.

pub mod backend;
pub mod chain;
pub mod comm;
pub mod config;
pub mod decomposition;
pub mod derivatives;
pub mod equilibrium;
pub mod error;
pub mod projection;
pub mod reconstruction;
pub mod structure;

pub use backend::{
    BackendError, DenseEigenSolver, EigenResult, EigenSolver, EigenSystemData, ShiftInvertSolver,
    SolveInfo, backend_for, default_backend,
};
pub use chain::{ModalAdjoint, ModalChain, ModalState, ModalTangent};
pub use comm::{Communicator, SelfComm, SharedMemoryComm};
pub use config::{EigenBackend, EigenConfig, ModalConfig};
pub use decomposition::{ModalBasis, ModalDecomposer, decompose, scatter_translational};
pub use derivatives::{JacMode, LinearOperator, dot_product_test, relative_mismatch};
pub use equilibrium::{EquilibriumLinearization, EquilibriumSolver, solve};
pub use error::{ModalError, Result};
pub use projection::{ForceProjector, project_force, project_force_fwd, project_force_rev};
pub use reconstruction::{
    DisplacementReconstructor, reconstruct, reconstruct_fwd, reconstruct_rev,
};
pub use structure::ModalStructure;

pub use modal_model::{MatrixKind, ModelError, ModelHandle, StructuralModel};
