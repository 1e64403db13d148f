//! Tangent and adjoint plumbing shared by the modal operators.
//!
//! Every operator in the chain exposes its linearization as a
//! [`LinearOperator`]: forward mode pushes a tangent through the Jacobian,
//! reverse mode pulls an adjoint seed back through its transpose. Both
//! directions accumulate into a caller-owned buffer, so contributions from
//! several paths can be summed without temporaries.
//!
//! For a correct pair the dot-product identity
//!
//! ```text
//! <J d, w> == <d, Jᵀ w>
//! ```
//!
//! holds for every `d` and `w`. [`dot_product_test`] evaluates the relative
//! mismatch of that identity for a single pair of vectors.

use nalgebra::DVector;

use crate::error::{Result, check_len};

/// Direction of a Jacobian-vector product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JacMode {
    /// `y += J x` (tangent propagation)
    Forward,
    /// `y += Jᵀ x` (adjoint propagation)
    Reverse,
}

/// Linearization of an operator at a fixed evaluation point.
pub trait LinearOperator {
    /// Length of the (tangent) input vector.
    fn input_len(&self) -> usize;

    /// Length of the (tangent) output vector.
    fn output_len(&self) -> usize;

    /// Accumulate `J x` (forward) or `Jᵀ x` (reverse) into `y`.
    fn apply(&self, mode: JacMode, x: &DVector<f64>, y: &mut DVector<f64>) -> Result<()>;

    /// Allocate and return `J x` or `Jᵀ x`.
    fn apply_new(&self, mode: JacMode, x: &DVector<f64>) -> Result<DVector<f64>> {
        let len = match mode {
            JacMode::Forward => self.output_len(),
            JacMode::Reverse => self.input_len(),
        };
        let mut y = DVector::zeros(len);
        self.apply(mode, x, &mut y)?;
        Ok(y)
    }
}

/// Check the lengths of `x` and `y` for a given mode.
pub(crate) fn check_apply<O: LinearOperator + ?Sized>(
    op: &O,
    mode: JacMode,
    x: &DVector<f64>,
    y: &DVector<f64>,
) -> Result<()> {
    let (x_len, y_len) = match mode {
        JacMode::Forward => (op.input_len(), op.output_len()),
        JacMode::Reverse => (op.output_len(), op.input_len()),
    };
    check_len("seed vector", x_len, x.len())?;
    check_len("accumulation vector", y_len, y.len())
}

/// `|a - b| / max(|a|, |b|)`, zero when both vanish.
pub fn relative_mismatch(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

/// Relative mismatch of `<J d, w>` against `<d, Jᵀ w>`.
pub fn dot_product_test<O: LinearOperator + ?Sized>(
    op: &O,
    tangent_in: &DVector<f64>,
    seed_out: &DVector<f64>,
) -> Result<f64> {
    check_len("tangent input", op.input_len(), tangent_in.len())?;
    check_len("adjoint seed", op.output_len(), seed_out.len())?;

    let tangent_out = op.apply_new(JacMode::Forward, tangent_in)?;
    let adjoint_in = op.apply_new(JacMode::Reverse, seed_out)?;

    Ok(relative_mismatch(
        tangent_out.dot(seed_out),
        tangent_in.dot(&adjoint_in),
    ))
}
