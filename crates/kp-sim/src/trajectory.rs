//! Time-ordered kinetics samples.

use crate::error::{SimError, SimResult};
use crate::kinetics::KineticsState;

/// One borrowed (time, state) sample of a [`Trajectory`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample<'a> {
    pub t: f64,
    pub state: &'a KineticsState,
}

impl Sample<'_> {
    pub fn neutron_density(&self) -> f64 {
        self.state.neutron_density()
    }
}

/// Ordered sequence of samples, strictly increasing in time.
///
/// All states share one length. Both properties are checked on every
/// insertion, so a `Trajectory` cannot be built out of order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    t: Vec<f64>,
    x: Vec<KineticsState>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            t: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
        }
    }

    /// Build from parallel time and state vectors, validating order.
    pub fn from_parts(t: Vec<f64>, x: Vec<KineticsState>) -> SimResult<Self> {
        if t.len() != x.len() {
            return Err(SimError::arg(format!(
                "{} times but {} states",
                t.len(),
                x.len()
            )));
        }
        let mut out = Self::with_capacity(t.len());
        for (t, x) in t.into_iter().zip(x) {
            out.push(t, x)?;
        }
        Ok(out)
    }

    /// Append a sample. Time must be finite and after the current last sample.
    pub fn push(&mut self, t: f64, state: KineticsState) -> SimResult<()> {
        if !t.is_finite() {
            return Err(SimError::arg(format!("sample time must be finite, got {t}")));
        }
        if let Some(last) = self.last_time() {
            if t <= last {
                return Err(SimError::arg(format!(
                    "sample time {t} does not follow last sample time {last}"
                )));
            }
        }
        if let Some(first) = self.x.first() {
            if first.len() != state.len() {
                return Err(SimError::StateMismatch {
                    expected: first.len(),
                    actual: state.len(),
                });
            }
        }
        self.t.push(t);
        self.x.push(state);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.t
    }

    pub fn states(&self) -> &[KineticsState] {
        &self.x
    }

    pub fn sample(&self, i: usize) -> Option<Sample<'_>> {
        Some(Sample {
            t: *self.t.get(i)?,
            state: self.x.get(i)?,
        })
    }

    pub fn first(&self) -> Option<Sample<'_>> {
        self.sample(0)
    }

    pub fn last(&self) -> Option<Sample<'_>> {
        self.len().checked_sub(1).and_then(|i| self.sample(i))
    }

    pub fn last_time(&self) -> Option<f64> {
        self.t.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample<'_>> + '_ {
        self.t
            .iter()
            .zip(&self.x)
            .map(|(&t, state)| Sample { t, state })
    }

    /// Neutron density series n(t), parallel to [`Trajectory::times`].
    pub fn neutron_density(&self) -> Vec<f64> {
        self.x.iter().map(KineticsState::neutron_density).collect()
    }

    /// Concentration series of one precursor group (0-based).
    pub fn precursor_series(&self, group: usize) -> Option<Vec<f64>> {
        self.x
            .iter()
            .map(|s| s.precursors().get(group).copied())
            .collect()
    }

    /// Owned copy of the samples from index `from` onwards.
    pub fn tail(&self, from: usize) -> Trajectory {
        let from = from.min(self.len());
        Trajectory {
            t: self.t[from..].to_vec(),
            x: self.x[from..].to_vec(),
        }
    }
}
