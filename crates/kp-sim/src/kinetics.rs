//! Point-kinetics equations.
//!
//! With reactivity rho in dollars and normalized generation time Lambda:
//!
//! ```text
//! dn/dt   = (rho(t) - 1)/Lambda * n + sum_i lambda_i * C_i
//! dC_i/dt = -lambda_i * C_i + a_i/Lambda * n,      a_i = beta_i / beta
//! ```

use kp_core::{DelayedNeutronData, ensure_positive};
use nalgebra::{DMatrix, DVector};

use crate::error::{SimError, SimResult};

/// Neutron density followed by the precursor concentrations.
///
/// Element 0 is `n`, elements `1..=G` are `C_i`.
#[derive(Clone, Debug, PartialEq)]
pub struct KineticsState(DVector<f64>);

impl KineticsState {
    pub fn from_vector(v: DVector<f64>) -> Self {
        Self(v)
    }

    pub fn from_parts(neutron_density: f64, precursors: &[f64]) -> Self {
        let mut v = DVector::zeros(1 + precursors.len());
        v[0] = neutron_density;
        v.rows_mut(1, precursors.len()).copy_from_slice(precursors);
        Self(v)
    }

    pub fn neutron_density(&self) -> f64 {
        self.0[0]
    }

    pub fn precursors(&self) -> &[f64] {
        &self.0.as_slice()[1..]
    }

    /// Total length, `1 + G`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn num_groups(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.0
    }

    pub fn into_vector(self) -> DVector<f64> {
        self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn is_non_negative(&self) -> bool {
        self.0.iter().all(|&v| v >= 0.0)
    }
}

/// Where the neutron population change comes from at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Contributions {
    /// Prompt term (rho - 1)/Lambda * n. Negative below prompt critical.
    pub prompt: f64,
    /// Decay source lambda_i * C_i per precursor group.
    pub delayed: Vec<f64>,
}

impl Contributions {
    /// dn/dt, the sum of all terms.
    pub fn net(&self) -> f64 {
        self.prompt + self.delayed.iter().sum::<f64>()
    }
}

/// Prompt-jump estimate of the neutron density right after a reactivity step.
///
/// Returns `None` at or above prompt critical, where the approximation breaks.
pub fn prompt_jump(rho_before: f64, rho_after: f64, neutron_density: f64) -> Option<f64> {
    if !rho_before.is_finite() || !rho_after.is_finite() || rho_after >= 1.0 {
        return None;
    }
    Some(neutron_density * (1.0 - rho_before) / (1.0 - rho_after))
}

/// The point-kinetics system for one data set and generation time.
#[derive(Clone, Debug)]
pub struct PointKinetics {
    data: DelayedNeutronData,
    decay_constants: DVector<f64>,
    relative_yields: DVector<f64>,
    generation_time: f64,
}

impl PointKinetics {
    pub fn new(data: DelayedNeutronData, generation_time: f64) -> SimResult<Self> {
        let generation_time = ensure_positive(generation_time, "normalized generation time")?;
        Ok(Self {
            decay_constants: DVector::from_vec(data.decay_constants()),
            relative_yields: DVector::from_vec(data.relative_yields()),
            data,
            generation_time,
        })
    }

    pub fn data(&self) -> &DelayedNeutronData {
        &self.data
    }

    pub fn generation_time(&self) -> f64 {
        self.generation_time
    }

    pub fn num_groups(&self) -> usize {
        self.decay_constants.len()
    }

    pub fn decay_constants(&self) -> &[f64] {
        self.decay_constants.as_slice()
    }

    /// a_i = beta_i / beta.
    pub fn relative_yields(&self) -> &[f64] {
        self.relative_yields.as_slice()
    }

    /// State vector length, `1 + G`.
    pub fn dim(&self) -> usize {
        1 + self.num_groups()
    }

    /// Critical equilibrium: n = 1 and every dC_i/dt = 0 at rho = 0.
    pub fn steady_state(&self) -> KineticsState {
        let mut v = DVector::zeros(self.dim());
        v[0] = 1.0;
        for i in 0..self.num_groups() {
            v[i + 1] = self.relative_yields[i] / self.generation_time / self.decay_constants[i];
        }
        KineticsState(v)
    }

    pub(crate) fn check_len(&self, len: usize) -> SimResult<()> {
        if len == self.dim() {
            Ok(())
        } else {
            Err(SimError::StateMismatch {
                expected: self.dim(),
                actual: len,
            })
        }
    }

    /// Right-hand side at reactivity `rho`.
    pub fn derivative(&self, rho: f64, x: &DVector<f64>) -> DVector<f64> {
        let g = self.num_groups();
        let n = x[0];
        let c = x.rows(1, g);
        let mut dx = DVector::zeros(1 + g);
        dx[0] = (rho - 1.0) / self.generation_time * n + self.decay_constants.dot(&c);
        let source = &self.relative_yields * (n / self.generation_time);
        let dc = source - self.decay_constants.component_mul(&c);
        dx.rows_mut(1, g).copy_from(&dc);
        dx
    }

    /// Jacobian of [`PointKinetics::derivative`]. The system is linear in the
    /// state, so this depends on reactivity only.
    pub fn jacobian(&self, rho: f64) -> DMatrix<f64> {
        let g = self.num_groups();
        let mut jac = DMatrix::zeros(1 + g, 1 + g);
        jac[(0, 0)] = (rho - 1.0) / self.generation_time;
        for i in 0..g {
            jac[(0, i + 1)] = self.decay_constants[i];
            jac[(i + 1, 0)] = self.relative_yields[i] / self.generation_time;
            jac[(i + 1, i + 1)] = -self.decay_constants[i];
        }
        jac
    }

    pub fn contributions(&self, rho: f64, state: &KineticsState) -> Contributions {
        let n = state.neutron_density();
        Contributions {
            prompt: (rho - 1.0) / self.generation_time * n,
            delayed: state
                .precursors()
                .iter()
                .zip(self.decay_constants.iter())
                .map(|(c, l)| c * l)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keepin() -> PointKinetics {
        PointKinetics::new(DelayedNeutronData::keepin_u235(), 1e-7 / 0.0035).unwrap()
    }

    #[test]
    fn steady_state_is_equilibrium() {
        let pk = keepin();
        let x0 = pk.steady_state();
        let dx = pk.derivative(0.0, x0.as_vector());
        // Terms are O(1/Lambda) ~ 3.5e4, so compare relative to that scale.
        let scale = 1.0 / pk.generation_time();
        for v in dx.iter() {
            assert!(v.abs() <= 1e-12 * scale, "derivative {v} not ~0");
        }
    }

    #[test]
    fn steady_precursors_match_balance() {
        let data = DelayedNeutronData::single_group(0.1, 1.0).unwrap();
        let pk = PointKinetics::new(data, 2.85e-5).unwrap();
        let x0 = pk.steady_state();
        assert_eq!(x0.neutron_density(), 1.0);
        let expected = 1.0 / (2.85e-5 * 0.1);
        assert!((x0.precursors()[0] - expected).abs() < 1e-9 * expected);
    }

    #[test]
    fn jacobian_matches_derivative() {
        // Linear system: f(x) = J x exactly.
        let pk = keepin();
        let x = DVector::from_fn(pk.dim(), |i, _| 1.0 + i as f64);
        let rho = 0.3;
        let direct = pk.derivative(rho, &x);
        let via_jac = pk.jacobian(rho) * &x;
        for (a, b) in direct.iter().zip(via_jac.iter()) {
            assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
        }
    }

    #[test]
    fn contributions_sum_to_dn_dt() {
        let pk = keepin();
        let x = pk.steady_state();
        let c = pk.contributions(0.2, &x);
        let dn = pk.derivative(0.2, x.as_vector())[0];
        assert_eq!(c.delayed.len(), 6);
        assert!((c.net() - dn).abs() <= 1e-9 * dn.abs());
        assert!(c.prompt < 0.0);
    }

    #[test]
    fn rejects_bad_generation_time() {
        let data = DelayedNeutronData::keepin_u235();
        assert!(PointKinetics::new(data.clone(), 0.0).is_err());
        assert!(PointKinetics::new(data.clone(), -1.0).is_err());
        assert!(PointKinetics::new(data, f64::NAN).is_err());
    }

    #[test]
    fn prompt_jump_estimate() {
        assert!((prompt_jump(0.0, 0.1, 1.0).unwrap() - 1.0 / 0.9).abs() < 1e-12);
        assert!((prompt_jump(0.0, -1.0, 2.0).unwrap() - 1.0).abs() < 1e-12);
        assert!(prompt_jump(0.0, 1.0, 1.0).is_none());
        assert!(prompt_jump(0.0, f64::NAN, 1.0).is_none());
    }

    #[test]
    fn state_accessors() {
        let s = KineticsState::from_parts(2.0, &[3.0, 4.0]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.num_groups(), 2);
        assert_eq!(s.precursors(), &[3.0, 4.0]);
        assert!(s.is_finite());
        assert!(s.is_non_negative());
        assert!(!KineticsState::from_parts(-1.0, &[]).is_non_negative());
    }
}
