//! Error types for modal-solver

use modal_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModalError>;

#[derive(Error, Debug)]
pub enum ModalError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Eigensolve failed: {0}")]
    EigensolveFailure(String),

    #[error("Singular modal stiffness in mode {mode}: k = {value:e}")]
    SingularModalStiffness { mode: usize, value: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Return `DimensionMismatch` unless `actual == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ModalError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}
