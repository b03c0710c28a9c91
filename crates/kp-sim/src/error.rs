//! Error types for kinetics integration.

use kp_core::CoreError;
use thiserror::Error;

/// Errors encountered while building or running the kinetics solver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Bad data, generation time or integrator options. Raised at construction.
    #[error("Invalid configuration: {what}")]
    InvalidConfiguration { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArgument { what: String },

    /// The adaptive integrator could not meet its tolerance or diverged.
    #[error("Integration failed at t={t}: {reason}")]
    IntegrationFailure { t: f64, reason: String },

    #[error("State length mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: usize, actual: usize },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub(crate) fn config(what: impl Into<String>) -> Self {
        SimError::InvalidConfiguration { what: what.into() }
    }

    pub(crate) fn arg(what: impl Into<String>) -> Self {
        SimError::InvalidArgument { what: what.into() }
    }

    pub(crate) fn failure(t: f64, reason: impl Into<String>) -> Self {
        SimError::IntegrationFailure {
            t,
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for SimError {
    fn from(e: CoreError) -> Self {
        SimError::InvalidConfiguration {
            what: e.to_string(),
        }
    }
}
