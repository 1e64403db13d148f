//! Dense backend using nalgebra.
//!
//! This is the default backend. It reduces K and M to the free DOFs, turns
//! the generalized problem into a standard one with a Cholesky factor of M,
//! and runs a full symmetric eigen decomposition. The eigenpairs whose
//! eigenvalues lie nearest the shift are then picked out. Suitable for small-to-medium models.

use nalgebra::linalg::{Cholesky, SymmetricEigen};
use nalgebra::{DMatrix, DVector};

use super::traits::*;

/// Dense generalized symmetric eigensolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseEigenSolver;

/// Solve K * phi = lambda * M * phi for all pairs of a small dense system.
///
/// Uses M = L * L^T to form K* = L^-1 * K * L^-T, solves K* psi = lambda psi
/// and maps back with phi = L^-T psi. The returned eigenvectors are
/// M-orthonormal. Eigenvalues come back unsorted.
pub(crate) fn generalized_symmetric_eigen(
    k: &DMatrix<f64>,
    m: &DMatrix<f64>,
) -> Result<(DVector<f64>, DMatrix<f64>), BackendError> {
    if k.nrows() != k.ncols() || m.nrows() != m.ncols() || k.nrows() != m.nrows() {
        return Err("K and M must be square and of equal size".into());
    }

    let chol = Cholesky::new(m.clone())
        .ok_or(BackendError("Mass matrix not positive definite".into()))?;
    let l = chol.l();

    // L^-1 K, then L^-1 (L^-1 K)^T = L^-1 K L^-T since K is symmetric
    let l_inv_k = l
        .solve_lower_triangular(k)
        .ok_or(BackendError("Singular Cholesky factor".into()))?;
    let k_star = l
        .solve_lower_triangular(&l_inv_k.transpose())
        .ok_or(BackendError("Singular Cholesky factor".into()))?;
    let k_star = (&k_star + k_star.transpose()) * 0.5;

    let eigen = SymmetricEigen::new(k_star);
    let phi = l
        .tr_solve_lower_triangular(&eigen.eigenvectors)
        .ok_or(BackendError("Singular Cholesky factor".into()))?;

    if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
        return Err("Non-finite eigenvalue in symmetric eigen decomposition".into());
    }

    Ok((eigen.eigenvalues, phi))
}

/// Indices of the `count` values nearest `target`, sorted by ascending value.
pub(crate) fn select_nearest(values: &[f64], target: f64, count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        (values[a] - target)
            .abs()
            .total_cmp(&(values[b] - target).abs())
            .then(values[a].total_cmp(&values[b]))
    });
    order.truncate(count);
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}

/// ||K phi - lambda M phi|| / max(||K phi||, |lambda| ||M phi||).
pub(crate) fn relative_residual(
    k: &DMatrix<f64>,
    m: &DMatrix<f64>,
    lambda: f64,
    phi: &DVector<f64>,
) -> f64 {
    let k_phi = k * phi;
    let m_phi = m * phi;
    let scale = k_phi.norm().max(lambda.abs() * m_phi.norm());
    if scale == 0.0 {
        return 0.0;
    }
    (k_phi - m_phi * lambda).norm() / scale
}

/// Validate a request against the number of free DOFs.
pub(crate) fn check_request(system: &EigenSystemData, num_eigs: usize) -> Result<(), BackendError> {
    let n = system.free_dofs.len();
    if n == 0 {
        return Err("No free DOFs for eigenvalue problem".into());
    }
    if num_eigs == 0 {
        return Err("At least one eigenpair must be requested".into());
    }
    if num_eigs > n {
        return Err(BackendError(format!(
            "Requested {} eigenpairs but only {} free DOFs are available",
            num_eigs, n
        )));
    }
    Ok(())
}

impl EigenSolver for DenseEigenSolver {
    fn solve_generalized(
        &self,
        system: &EigenSystemData,
        shift: f64,
        num_eigs: usize,
        _tol: f64,
    ) -> Result<(EigenResult, SolveInfo), BackendError> {
        check_request(system, num_eigs)?;
        let (k_red, m_red) = system.reduced_dense()?;
        let (values, vectors) = generalized_symmetric_eigen(&k_red, &m_red)?;

        let picked = select_nearest(values.as_slice(), shift, num_eigs);

        let mut reduced = DMatrix::zeros(k_red.nrows(), picked.len());
        let mut eigenvalues = Vec::with_capacity(picked.len());
        let mut residual: f64 = 0.0;
        for (mode, &idx) in picked.iter().enumerate() {
            let phi = vectors.column(idx).into_owned();
            residual = residual.max(relative_residual(&k_red, &m_red, values[idx], &phi));
            reduced.set_column(mode, &phi);
            eigenvalues.push(values[idx]);
        }

        Ok((
            EigenResult {
                eigenvalues,
                eigenvectors: system.expand(&reduced),
            },
            SolveInfo {
                iterations: 1,
                residual_norm: Some(residual),
                solver_name: self.name().to_string(),
            },
        ))
    }

    fn name(&self) -> &str {
        "nalgebra-Cholesky+SymmetricEigen"
    }
}
