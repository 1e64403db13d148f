//! Modal decomposition configuration.
//!
//! Mirrors the knobs of the frequency analysis step: how many modes to keep,
//! where to place the shift, and how hard the eigensolver should work.
//! Every struct round-trips through JSON so the coupling framework can pass
//! solver options as a document.

use serde::{Deserialize, Serialize};

use crate::error::{ModalError, Result};

/// Eigensolver backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EigenBackend {
    /// Dense Cholesky reduction + symmetric eigen decomposition
    #[default]
    Dense,
    /// Shift-and-invert block subspace iteration
    ShiftInvert,
}

/// Eigensolver controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EigenConfig {
    /// Relative residual tolerance for iterative backends
    pub tolerance: f64,
    /// Iteration budget for iterative backends
    pub max_iterations: usize,
    /// Block size for subspace iteration (None: min(2n, n + 8))
    pub subspace_size: Option<usize>,
    /// Which backend performs the solve
    pub backend: EigenBackend,
}

impl Default for EigenConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: 500,
            subspace_size: None,
            backend: EigenBackend::Dense,
        }
    }
}

/// Top-level modal solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalConfig {
    /// Number of modes kept in the basis
    pub nmodes: usize,
    /// Shift target in Hz; the solver looks for λ near σ = 2π f
    pub target_frequency_hz: f64,
    /// Eigensolver controls
    pub eigen: EigenConfig,
    /// Modal stiffness with |k[i]| at or below this is singular
    pub singular_tolerance: f64,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            nmodes: 1,
            target_frequency_hz: 1.0,
            eigen: EigenConfig::default(),
            singular_tolerance: 1e-12,
        }
    }
}

impl ModalConfig {
    pub fn with_nmodes(nmodes: usize) -> Self {
        Self {
            nmodes,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Eigenvalue shift σ = 2π f.
    pub fn shift(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.target_frequency_hz
    }

    pub fn validate(&self) -> Result<()> {
        if self.nmodes == 0 {
            return Err(ModalError::InvalidConfig("nmodes must be at least 1".into()));
        }
        if !self.target_frequency_hz.is_finite() || self.target_frequency_hz < 0.0 {
            return Err(ModalError::InvalidConfig(format!(
                "target_frequency_hz must be finite and non-negative, got {}",
                self.target_frequency_hz
            )));
        }
        if !(self.eigen.tolerance.is_finite() && self.eigen.tolerance > 0.0) {
            return Err(ModalError::InvalidConfig(format!(
                "eigen.tolerance must be positive, got {}",
                self.eigen.tolerance
            )));
        }
        if self.eigen.max_iterations == 0 {
            return Err(ModalError::InvalidConfig(
                "eigen.max_iterations must be at least 1".into(),
            ));
        }
        if !(self.singular_tolerance.is_finite() && self.singular_tolerance >= 0.0) {
            return Err(ModalError::InvalidConfig(format!(
                "singular_tolerance must be non-negative, got {}",
                self.singular_tolerance
            )));
        }
        Ok(())
    }
}
