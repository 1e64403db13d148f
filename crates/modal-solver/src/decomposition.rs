//! Modal decomposition of a full structural model.
//!
//! Solves the undamped free-vibration problem
//!
//! ```text
//! (K(dv) - λ M) φ = 0
//! ```
//!
//! for the `nmodes` eigenvalues nearest a shift `σ = 2π f_target`, and packs
//! the result into a [`ModalBasis`] that the rest of the chain consumes.
//!
//! # Workflow
//! 1. Store the design variables on the model
//! 2. Assemble K(dv) and M
//! 3. Solve K φ = λ M φ on the free DOFs for the λ nearest σ
//! 4. k_i = λ_i, m_i = 1 (eigenvectors are mass-normalized)
//! 5. Scatter the translational components of each φ_i into row i of
//!    the mode-shape matrix; rotational DOFs are dropped
//!
//! The basis is treated as frozen by the derivative rules downstream:
//! sensitivities of mode shapes and eigenvalues with respect to the design
//! variables are not propagated.

use std::ops::Range;

use modal_model::{MatrixKind, StructuralModel, TRANSLATIONAL_DOFS};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::backend::{EigenSolver, EigenSystemData, backend_for};
use crate::config::ModalConfig;
use crate::error::{ModalError, Result, check_len};

/// Reduced basis produced by one decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalBasis {
    /// Number of retained modes
    pub nmodes: usize,
    /// Mode shapes, one row per mode: nmodes × 3·Nn
    pub mode_shape: DMatrix<f64>,
    /// Generalized stiffness per mode (eigenvalue λ = ω²)
    pub modal_stiffness: DVector<f64>,
    /// Generalized mass per mode, always 1.0
    pub modal_mass: DVector<f64>,
    /// Undeformed nodal coordinates, length 3·Nn
    pub x_s0: DVector<f64>,
}

impl ModalBasis {
    /// Length of the nodal force/displacement vectors (3·Nn).
    pub fn node_size(&self) -> usize {
        self.mode_shape.ncols()
    }

    /// Angular frequency (rad/s) of a mode; 0 for non-positive stiffness.
    pub fn angular_frequency(&self, mode: usize) -> Option<f64> {
        self.modal_stiffness
            .get(mode)
            .map(|&lambda| if lambda > 0.0 { lambda.sqrt() } else { 0.0 })
    }

    /// Natural frequencies in Hz.
    pub fn frequencies_hz(&self) -> Vec<f64> {
        (0..self.nmodes)
            .filter_map(|mode| self.angular_frequency(mode))
            .map(|omega| omega / (2.0 * std::f64::consts::PI))
            .collect()
    }

    /// Columns of the mode-shape matrix owned by a contiguous node range.
    pub fn local_mode_shape(&self, nodes: Range<usize>) -> Result<DMatrix<f64>> {
        let num_nodes = self.node_size() / TRANSLATIONAL_DOFS;
        if nodes.start > nodes.end || nodes.end > num_nodes {
            return Err(ModalError::DimensionMismatch {
                what: "partition node range end",
                expected: num_nodes,
                actual: nodes.end,
            });
        }
        let start = nodes.start * TRANSLATIONAL_DOFS;
        let len = nodes.len() * TRANSLATIONAL_DOFS;
        Ok(self.mode_shape.columns(start, len).into_owned())
    }
}

/// Copy the translational DOFs of each eigenvector into a mode-shape row.
///
/// `eigenvectors` is `num_nodes·dofs_per_node × nmodes` (one column per
/// mode). Row `i` of the result holds, for every node `n` and direction
/// `d < 3`, the entry `eigenvectors[n·dofs_per_node + d, i]` at column
/// `3n + d`.
pub fn scatter_translational(
    eigenvectors: &DMatrix<f64>,
    num_nodes: usize,
    dofs_per_node: usize,
) -> Result<DMatrix<f64>> {
    if dofs_per_node < TRANSLATIONAL_DOFS {
        return Err(ModalError::DimensionMismatch {
            what: "dofs per node",
            expected: TRANSLATIONAL_DOFS,
            actual: dofs_per_node,
        });
    }
    check_len("eigenvector length", num_nodes * dofs_per_node, eigenvectors.nrows())?;

    let nmodes = eigenvectors.ncols();
    let node_size = num_nodes * TRANSLATIONAL_DOFS;
    let rows: Vec<Vec<f64>> = (0..nmodes)
        .into_par_iter()
        .map(|mode| {
            let phi = eigenvectors.column(mode);
            let mut row = vec![0.0; node_size];
            for node in 0..num_nodes {
                for d in 0..TRANSLATIONAL_DOFS {
                    row[node * TRANSLATIONAL_DOFS + d] = phi[node * dofs_per_node + d];
                }
            }
            row
        })
        .collect();

    Ok(DMatrix::from_fn(nmodes, node_size, |i, j| rows[i][j]))
}

/// Computes [`ModalBasis`] instances from a structural model.
pub struct ModalDecomposer {
    config: ModalConfig,
    solver: Box<dyn EigenSolver>,
}

impl ModalDecomposer {
    /// Decomposer using the backend selected in `config.eigen`.
    pub fn new(config: ModalConfig) -> Result<Self> {
        let solver = backend_for(&config.eigen);
        Self::with_solver(config, solver)
    }

    /// Decomposer with an explicitly provided eigensolver.
    pub fn with_solver(config: ModalConfig, solver: Box<dyn EigenSolver>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, solver })
    }

    pub fn config(&self) -> &ModalConfig {
        &self.config
    }

    pub fn nmodes(&self) -> usize {
        self.config.nmodes
    }

    /// Run the decomposition for one design point.
    ///
    /// Mutates the model's design-variable state. Callers sharing a model
    /// between threads must serialize calls (see `modal_model::ModelHandle`).
    pub fn decompose<M: StructuralModel + ?Sized>(
        &self,
        model: &mut M,
        design_vars: &[f64],
    ) -> Result<ModalBasis> {
        check_len("design_vars", model.design_var_count(), design_vars.len())?;
        let num_nodes = model.node_count();
        let dofs_per_node = model.dofs_per_node();
        if dofs_per_node < TRANSLATIONAL_DOFS {
            return Err(ModalError::DimensionMismatch {
                what: "dofs per node",
                expected: TRANSLATIONAL_DOFS,
                actual: dofs_per_node,
            });
        }
        let num_dofs = num_nodes * dofs_per_node;

        model.set_design_vars(design_vars)?;
        let stiffness = model.assemble(MatrixKind::Stiffness)?;
        let mass = model.assemble(MatrixKind::Mass)?;
        check_len("stiffness rows", num_dofs, stiffness.nrows())?;
        check_len("mass rows", num_dofs, mass.nrows())?;

        let free_dofs = free_dofs(num_dofs, &model.constrained_dofs())?;
        let system = EigenSystemData {
            stiffness,
            mass,
            num_dofs,
            free_dofs,
        };

        let nmodes = self.config.nmodes;
        let (result, info) = self
            .solver
            .solve_generalized(
                &system,
                self.config.shift(),
                nmodes,
                self.config.eigen.tolerance,
            )
            .map_err(|e| ModalError::EigensolveFailure(e.0))?;

        if result.num_modes() != nmodes || result.eigenvectors.ncols() != nmodes {
            return Err(ModalError::EigensolveFailure(format!(
                "{} returned {} eigenpairs, {} requested",
                info.solver_name,
                result.num_modes(),
                nmodes
            )));
        }
        if result.eigenvalues.iter().any(|v| !v.is_finite()) {
            return Err(ModalError::EigensolveFailure(format!(
                "{} returned non-finite eigenvalues",
                info.solver_name
            )));
        }

        let mode_shape = scatter_translational(&result.eigenvectors, num_nodes, dofs_per_node)?;
        let x_s0 = model.undeformed_coordinates();
        check_len("undeformed coordinates", num_nodes * TRANSLATIONAL_DOFS, x_s0.len())?;

        let basis = ModalBasis {
            nmodes,
            mode_shape,
            modal_stiffness: DVector::from_vec(result.eigenvalues),
            modal_mass: DVector::from_element(nmodes, 1.0),
            x_s0,
        };

        let freqs = basis.frequencies_hz();
        tracing::info!(
            nmodes,
            solver = %info.solver_name,
            iterations = info.iterations,
            residual = info.residual_norm,
            f_min_hz = freqs.first().copied(),
            f_max_hz = freqs.last().copied(),
            "modal decomposition complete"
        );

        Ok(basis)
    }
}

impl std::fmt::Debug for ModalDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalDecomposer")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .finish()
    }
}

/// One-shot decomposition with the default backend.
pub fn decompose<M: StructuralModel + ?Sized>(
    model: &mut M,
    design_vars: &[f64],
    nmodes: usize,
    target_frequency_hz: f64,
) -> Result<ModalBasis> {
    let config = ModalConfig {
        nmodes,
        target_frequency_hz,
        ..Default::default()
    };
    ModalDecomposer::new(config)?.decompose(model, design_vars)
}

fn free_dofs(num_dofs: usize, constrained: &[usize]) -> Result<Vec<usize>> {
    let mut is_free = vec![true; num_dofs];
    for &dof in constrained {
        match is_free.get_mut(dof) {
            Some(slot) => *slot = false,
            None => {
                return Err(ModalError::DimensionMismatch {
                    what: "constrained DOF index bound",
                    expected: num_dofs,
                    actual: dof,
                });
            }
        }
    }
    Ok((0..num_dofs).filter(|&d| is_free[d]).collect())
}
