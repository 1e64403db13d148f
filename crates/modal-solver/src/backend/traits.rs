//! Backend trait definitions for the generalized eigensolver.
//!
//! The modal decomposer hands the assembled operators to an [`EigenSolver`]
//! and gets back eigenpairs in full DOF space. Everything behind this trait
//! is interchangeable: a dense direct method for small models, an iterative
//! shift-and-invert method, or an external library.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;

/// Error type for backend operations.
#[derive(Debug, Clone)]
pub struct BackendError(pub String);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

/// A generalized eigenvalue system: K * phi = lambda * M * phi.
pub struct EigenSystemData {
    /// Stiffness matrix (full DOF space)
    pub stiffness: CsrMatrix<f64>,
    /// Mass matrix (full DOF space)
    pub mass: CsrMatrix<f64>,
    /// Total number of degrees of freedom
    pub num_dofs: usize,
    /// Indices of free (unconstrained) DOFs, ascending
    pub free_dofs: Vec<usize>,
}

impl EigenSystemData {
    /// Dense K and M restricted to the free DOFs.
    pub fn reduced_dense(&self) -> Result<(DMatrix<f64>, DMatrix<f64>), BackendError> {
        let n_full = self.num_dofs;
        for (name, op) in [("stiffness", &self.stiffness), ("mass", &self.mass)] {
            if op.nrows() != n_full || op.ncols() != n_full {
                return Err(BackendError(format!(
                    "{} operator is {}x{}, expected {}x{}",
                    name,
                    op.nrows(),
                    op.ncols(),
                    n_full,
                    n_full
                )));
            }
        }

        let mut full_to_free = vec![None; n_full];
        for (i_red, &i_full) in self.free_dofs.iter().enumerate() {
            let slot = full_to_free
                .get_mut(i_full)
                .ok_or_else(|| BackendError(format!("free DOF {} out of range", i_full)))?;
            *slot = Some(i_red);
        }

        let n = self.free_dofs.len();
        let reduce = |op: &CsrMatrix<f64>| {
            let mut dense = DMatrix::zeros(n, n);
            for (r, c, v) in op.triplet_iter() {
                if let (Some(i), Some(j)) = (full_to_free[r], full_to_free[c]) {
                    dense[(i, j)] += *v;
                }
            }
            dense
        };

        Ok((reduce(&self.stiffness), reduce(&self.mass)))
    }

    /// Scatter reduced eigenvectors (free DOFs × modes) into full DOF space.
    pub fn expand(&self, reduced: &DMatrix<f64>) -> DMatrix<f64> {
        let mut full = DMatrix::zeros(self.num_dofs, reduced.ncols());
        for mode in 0..reduced.ncols() {
            for (i_red, &i_full) in self.free_dofs.iter().enumerate() {
                full[(i_full, mode)] = reduced[(i_red, mode)];
            }
        }
        full
    }
}

/// Results from an eigenvalue solve.
pub struct EigenResult {
    /// Eigenvalues (lambda = omega^2), sorted ascending
    pub eigenvalues: Vec<f64>,
    /// Mass-normalized eigenvectors as columns in full DOF space
    /// (num_dofs x num_modes), zero on constrained DOFs
    pub eigenvectors: DMatrix<f64>,
}

impl EigenResult {
    pub fn num_modes(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn eigenvector(&self, mode: usize) -> Option<DVector<f64>> {
        (mode < self.eigenvectors.ncols()).then(|| self.eigenvectors.column(mode).into_owned())
    }
}

/// Solver convergence and diagnostic info.
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// Largest relative residual over returned pairs (if measured)
    pub residual_norm: Option<f64>,
    /// Human-readable solver name
    pub solver_name: String,
}

/// Trait for a generalized eigenvalue solver backend.
///
/// Implementations solve K * phi = lambda * M * phi for the `num_eigs`
/// eigenpairs whose eigenvalues lie nearest `shift`. The shift is compared
/// with λ directly and is the operator shift of `K - shift*M`.
/// Eigenvectors are M-orthonormal.
pub trait EigenSolver: Send + Sync {
    fn solve_generalized(
        &self,
        system: &EigenSystemData,
        shift: f64,
        num_eigs: usize,
        tol: f64,
    ) -> Result<(EigenResult, SolveInfo), BackendError>;

    /// Human-readable name of this backend.
    fn name(&self) -> &str;
}
