//! Delayed-neutron precursor data.
//!
//! This is the input contract between the nuclear-data collaborator and the
//! kinetics solver: an ordered list of precursor groups, each with a decay
//! constant and a delayed-neutron fraction. A [`DelayedNeutronData`] value is
//! always valid; every constructor (including deserialization) runs the same
//! checks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Total delayed fraction of thermal U-235 fission.
pub const U235_BETA: f64 = 0.0065;

/// Keepin six-group decay constants for thermal U-235 fission (1/s).
pub const KEEPIN_U235_DECAY_CONSTANTS: [f64; 6] = [0.0124, 0.0305, 0.111, 0.301, 1.14, 3.01];

/// Keepin six-group relative abundances for thermal U-235 fission.
pub const KEEPIN_U235_RELATIVE_YIELDS: [f64; 6] = [0.033, 0.219, 0.196, 0.395, 0.115, 0.042];

/// A single lumped group of delayed-neutron emitters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrecursorGroup {
    /// Decay constant lambda_i (1/time), strictly positive.
    pub decay_constant: f64,
    /// Delayed-neutron fraction beta_i, non-negative.
    pub delayed_fraction: f64,
}

impl PrecursorGroup {
    pub fn new(decay_constant: f64, delayed_fraction: f64) -> Self {
        Self {
            decay_constant,
            delayed_fraction,
        }
    }

    /// Mean lifetime 1/lambda_i.
    pub fn mean_lifetime(&self) -> f64 {
        1.0 / self.decay_constant
    }
}

/// On-disk shape of a data set, validated on the way in.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct DataFile {
    groups: Vec<PrecursorGroup>,
}

/// Immutable, validated set of delayed-neutron precursor groups.
///
/// Invariants:
/// - at least one group
/// - every decay constant finite and > 0
/// - every delayed fraction finite and >= 0
/// - total delayed fraction beta > 0
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "DataFile", into = "DataFile")
)]
pub struct DelayedNeutronData {
    groups: Vec<PrecursorGroup>,
    total_fraction: f64,
}

impl DelayedNeutronData {
    /// Build from a list of groups.
    pub fn new(groups: Vec<PrecursorGroup>) -> CoreResult<Self> {
        if groups.is_empty() {
            return Err(CoreError::config("precursor group set is empty"));
        }
        for (i, g) in groups.iter().enumerate() {
            if !g.decay_constant.is_finite() || g.decay_constant <= 0.0 {
                return Err(CoreError::config(format!(
                    "group {i}: decay constant must be finite and positive, got {}",
                    g.decay_constant
                )));
            }
            if !g.delayed_fraction.is_finite() || g.delayed_fraction < 0.0 {
                return Err(CoreError::config(format!(
                    "group {i}: delayed fraction must be finite and non-negative, got {}",
                    g.delayed_fraction
                )));
            }
        }
        let total_fraction: f64 = groups.iter().map(|g| g.delayed_fraction).sum();
        if total_fraction <= 0.0 {
            return Err(CoreError::config("total delayed fraction must be positive"));
        }
        Ok(Self {
            groups,
            total_fraction,
        })
    }

    /// Build from parallel columns of decay constants and delayed fractions.
    pub fn from_columns(decay_constants: &[f64], delayed_fractions: &[f64]) -> CoreResult<Self> {
        if decay_constants.len() != delayed_fractions.len() {
            return Err(CoreError::config(format!(
                "{} decay constants but {} delayed fractions",
                decay_constants.len(),
                delayed_fractions.len()
            )));
        }
        Self::new(
            decay_constants
                .iter()
                .zip(delayed_fractions)
                .map(|(&l, &b)| PrecursorGroup::new(l, b))
                .collect(),
        )
    }

    /// Keepin six-group constants for thermal U-235 (beta = 0.0065).
    pub fn keepin_u235() -> Self {
        let fractions = KEEPIN_U235_RELATIVE_YIELDS.map(|a| a * U235_BETA);
        let groups = KEEPIN_U235_DECAY_CONSTANTS
            .iter()
            .zip(fractions)
            .map(|(&l, b)| PrecursorGroup::new(l, b))
            .collect::<Vec<_>>();
        let total_fraction = groups.iter().map(|g| g.delayed_fraction).sum();
        Self {
            groups,
            total_fraction,
        }
    }

    /// A one-group data set.
    pub fn single_group(decay_constant: f64, delayed_fraction: f64) -> CoreResult<Self> {
        Self::new(vec![PrecursorGroup::new(decay_constant, delayed_fraction)])
    }

    pub fn groups(&self) -> &[PrecursorGroup] {
        &self.groups
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn decay_constants(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.decay_constant).collect()
    }

    pub fn delayed_fractions(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.delayed_fraction).collect()
    }

    /// Total delayed fraction beta = sum of beta_i.
    pub fn total_fraction(&self) -> f64 {
        self.total_fraction
    }

    /// Relative yields a_i = beta_i / beta. Sums to one.
    pub fn relative_yields(&self) -> Vec<f64> {
        self.groups
            .iter()
            .map(|g| g.delayed_fraction / self.total_fraction)
            .collect()
    }

    /// Yield-weighted mean precursor lifetime, sum of a_i / lambda_i.
    pub fn mean_lifetime(&self) -> f64 {
        self.groups
            .iter()
            .map(|g| g.delayed_fraction / self.total_fraction * g.mean_lifetime())
            .sum()
    }

    /// Smallest decay constant (the slowest group).
    pub fn min_decay_constant(&self) -> f64 {
        self.groups
            .iter()
            .map(|g| g.decay_constant)
            .fold(f64::INFINITY, f64::min)
    }
}

impl TryFrom<DataFile> for DelayedNeutronData {
    type Error = CoreError;

    fn try_from(file: DataFile) -> CoreResult<Self> {
        Self::new(file.groups)
    }
}

impl From<DelayedNeutronData> for DataFile {
    fn from(data: DelayedNeutronData) -> Self {
        DataFile {
            groups: data.groups,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn valid_columns_always_accepted(
            groups in prop::collection::vec((1e-4_f64..10.0, 1e-6_f64..1.0), 1..8)
        ) {
            let (lambdas, betas): (Vec<f64>, Vec<f64>) = groups.into_iter().unzip();
            let data = DelayedNeutronData::from_columns(&lambdas, &betas).unwrap();
            prop_assert_eq!(data.num_groups(), lambdas.len());
            let sum: f64 = data.relative_yields().iter().sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
            prop_assert!(data.min_decay_constant() > 0.0);
        }
    }
}
