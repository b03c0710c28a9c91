//! Session configuration.

use kp_core::ensure_positive;
use kp_sim::AdaptiveOptions;
use serde::{Deserialize, Serialize};

use crate::error::SessionResult;

/// How far ahead each re-solve looks, in simulation time units.
pub const DEFAULT_HORIZON: f64 = 20.0;

/// Largest gap between consecutive future samples.
pub const DEFAULT_MAX_SAMPLE_SPACING: f64 = 0.05;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of every future solve.
    pub horizon: f64,
    /// Caps the integrator step so the future stays smooth for display.
    pub max_sample_spacing: f64,
    /// Integrator tolerances and limits.
    pub solver: AdaptiveOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            max_sample_spacing: DEFAULT_MAX_SAMPLE_SPACING,
            solver: AdaptiveOptions::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_max_sample_spacing(mut self, spacing: f64) -> Self {
        self.max_sample_spacing = spacing;
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        ensure_positive(self.horizon, "horizon")?;
        ensure_positive(self.max_sample_spacing, "max sample spacing")?;
        self.solver.validate()?;
        Ok(())
    }

    /// Integrator options with the step capped at the sample spacing.
    pub fn solver_options(&self) -> AdaptiveOptions {
        let cap = match self.solver.max_step {
            Some(h) => h.min(self.max_sample_spacing),
            None => self.max_sample_spacing,
        };
        self.solver.clone().with_max_step(cap)
    }
}
