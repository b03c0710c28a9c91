//! Reactivity sources.
//!
//! The solver reads reactivity (in dollars) through [`ReactivitySource`]
//! while integrating. It may query the same time many times per step.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Reactivity as a function of time.
pub trait ReactivitySource {
    fn evaluate(&self, t: f64) -> f64;
}

impl<F> ReactivitySource for F
where
    F: Fn(f64) -> f64,
{
    fn evaluate(&self, t: f64) -> f64 {
        self(t)
    }
}

/// Single held value, constant in time until changed.
///
/// This is the control input of an interactive session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeldReactivity {
    rho: f64,
}

impl HeldReactivity {
    pub fn new(rho: f64) -> Self {
        Self { rho }
    }

    pub fn get(&self) -> f64 {
        self.rho
    }

    /// Replace the held value, returning the previous one.
    pub fn set(&mut self, rho: f64) -> f64 {
        std::mem::replace(&mut self.rho, rho)
    }
}

impl ReactivitySource for HeldReactivity {
    fn evaluate(&self, _t: f64) -> f64 {
        self.rho
    }
}

/// One breakpoint of a [`StepSchedule`]: reactivity `rho` applies from `t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub t: f64,
    pub rho: f64,
}

/// Piecewise-constant reactivity table.
///
/// Before the first breakpoint the reactivity is `initial`. A breakpoint at
/// `t` takes effect for times strictly after `t`, so `evaluate(t)` at the
/// breakpoint itself still returns the previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSchedule {
    initial: f64,
    steps: Vec<Step>,
}

impl StepSchedule {
    pub fn new(initial: f64, steps: Vec<Step>) -> SimResult<Self> {
        if !initial.is_finite() {
            return Err(SimError::arg("initial reactivity must be finite"));
        }
        for pair in steps.windows(2) {
            if pair[1].t <= pair[0].t {
                return Err(SimError::arg(format!(
                    "schedule times must increase: {} then {}",
                    pair[0].t, pair[1].t
                )));
            }
        }
        if steps.iter().any(|s| !s.t.is_finite() || !s.rho.is_finite()) {
            return Err(SimError::arg("schedule entries must be finite"));
        }
        Ok(Self { initial, steps })
    }

    pub fn constant(rho: f64) -> SimResult<Self> {
        Self::new(rho, Vec::new())
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl ReactivitySource for StepSchedule {
    fn evaluate(&self, t: f64) -> f64 {
        self.steps
            .iter()
            .take_while(|s| s.t < t)
            .last()
            .map_or(self.initial, |s| s.rho)
    }
}
