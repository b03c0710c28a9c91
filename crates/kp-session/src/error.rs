//! Error types for interactive sessions.

use kp_sim::SimError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while running an interactive session.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// Failure from the kinetics solver, passed through unchanged.
    #[error("Kinetics error: {0}")]
    Sim(#[from] SimError),

    /// The future was read while exhausted. Call `recompute_future` first.
    #[error("Future trajectory is empty; recompute the future before reading it")]
    EmptyFutureAccess,

    #[error("Invalid configuration: {what}")]
    InvalidConfiguration { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArgument { what: String },

    /// A manual clock was asked to move backwards.
    #[error("Clock cannot move backwards from {from} to {to}")]
    ClockRegression { from: f64, to: f64 },
}

impl From<kp_core::CoreError> for SessionError {
    fn from(e: kp_core::CoreError) -> Self {
        SessionError::InvalidConfiguration {
            what: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_errors_pass_through() {
        let sim = SimError::IntegrationFailure {
            t: 2.0,
            reason: "step size underflow".into(),
        };
        let err: SessionError = sim.clone().into();
        assert_eq!(err, SessionError::Sim(sim));
        assert!(err.to_string().contains("step size underflow"));
    }
}
