//! Point-kinetics solver with continuation.

use kp_core::DelayedNeutronData;
use nalgebra::{DMatrix, DVector};

use crate::error::{SimError, SimResult};
use crate::integrator::{AdaptiveOptions, IntegrationStats, Integrator, Rosenbrock23};
use crate::kinetics::{Contributions, KineticsState, PointKinetics};
use crate::model::TransientModel;
use crate::reactivity::{HeldReactivity, ReactivitySource};
use crate::trajectory::Trajectory;

/// Point kinetics bound to a reactivity source for one integration.
struct BoundKinetics<'a, R> {
    kinetics: &'a PointKinetics,
    reactivity: &'a R,
}

impl<R: ReactivitySource> TransientModel for BoundKinetics<'_, R> {
    fn dim(&self) -> usize {
        self.kinetics.dim()
    }

    fn rhs(&mut self, t: f64, x: &DVector<f64>) -> SimResult<DVector<f64>> {
        Ok(self.kinetics.derivative(self.reactivity.evaluate(t), x))
    }

    fn jacobian(&mut self, t: f64, _x: &DVector<f64>) -> SimResult<DMatrix<f64>> {
        Ok(self.kinetics.jacobian(self.reactivity.evaluate(t)))
    }
}

/// Integrates point kinetics and remembers where it stopped.
///
/// The solver starts at the critical steady state. Every successful
/// [`KineticsSolver::solve`] leaves the internal state at the last returned
/// sample so the next call continues from there. Reactivity is read from the
/// owned source `R` while integrating; within one step it is treated as
/// constant, so step changes are resolved by the error control.
#[derive(Debug, Clone)]
pub struct KineticsSolver<R = HeldReactivity> {
    kinetics: PointKinetics,
    reactivity: R,
    initial: KineticsState,
    state: KineticsState,
    integrator: Rosenbrock23,
    last_stats: IntegrationStats,
}

impl<R: ReactivitySource> KineticsSolver<R> {
    /// Build a solver with default integration options.
    pub fn new(data: DelayedNeutronData, reactivity: R, generation_time: f64) -> SimResult<Self> {
        Self::with_options(data, reactivity, generation_time, AdaptiveOptions::default())
    }

    pub fn with_options(
        data: DelayedNeutronData,
        reactivity: R,
        generation_time: f64,
        options: AdaptiveOptions,
    ) -> SimResult<Self> {
        options.validate()?;
        let kinetics = PointKinetics::new(data, generation_time)?;
        let initial = kinetics.steady_state();
        Ok(Self {
            state: initial.clone(),
            initial,
            kinetics,
            reactivity,
            integrator: Rosenbrock23::new(options),
            last_stats: IntegrationStats::default(),
        })
    }

    /// Integrate from the current state at `start` to `end`.
    ///
    /// On success the internal state moves to the last sample. On failure it
    /// is left unchanged.
    pub fn solve(&mut self, start: f64, end: f64) -> SimResult<Trajectory> {
        let mut model = BoundKinetics {
            kinetics: &self.kinetics,
            reactivity: &self.reactivity,
        };
        let record = match self
            .integrator
            .integrate(&mut model, start, end, self.state.as_vector())
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(start, end, error = %e, "kinetics solve failed");
                return Err(e);
            }
        };

        let stats = record.stats;
        let states = record.x.into_iter().map(KineticsState::from_vector).collect();
        let trajectory = Trajectory::from_parts(record.t, states)?;
        let last = trajectory
            .last()
            .ok_or_else(|| SimError::failure(end, "integrator returned no samples"))?;
        self.state = last.state.clone();
        self.last_stats = stats;

        tracing::debug!(
            start,
            end,
            samples = trajectory.len(),
            accepted = stats.accepted,
            rejected = stats.rejected,
            n_end = self.state.neutron_density(),
            "kinetics solve"
        );
        Ok(trajectory)
    }

    /// State the next [`KineticsSolver::solve`] starts from.
    pub fn state(&self) -> &KineticsState {
        &self.state
    }

    /// Replace the continuation state.
    pub fn set_state(&mut self, state: KineticsState) -> SimResult<()> {
        self.kinetics.check_len(state.len())?;
        if !state.is_finite() {
            return Err(SimError::arg("continuation state must be finite"));
        }
        self.state = state;
        Ok(())
    }

    /// The steady state computed at construction.
    pub fn initial_state(&self) -> &KineticsState {
        &self.initial
    }

    pub fn reactivity(&self) -> &R {
        &self.reactivity
    }

    pub fn reactivity_mut(&mut self) -> &mut R {
        &mut self.reactivity
    }

    pub fn kinetics(&self) -> &PointKinetics {
        &self.kinetics
    }

    pub fn generation_time(&self) -> f64 {
        self.kinetics.generation_time()
    }

    pub fn options(&self) -> &AdaptiveOptions {
        &self.integrator.options
    }

    /// Work counters of the most recent successful solve.
    pub fn last_stats(&self) -> IntegrationStats {
        self.last_stats
    }

    /// Derivative of `state` at time `t` under the current reactivity.
    pub fn derivative(&self, t: f64, state: &KineticsState) -> SimResult<KineticsState> {
        self.kinetics.check_len(state.len())?;
        let rho = self.reactivity.evaluate(t);
        Ok(KineticsState::from_vector(
            self.kinetics.derivative(rho, state.as_vector()),
        ))
    }

    /// Per-term sources of dn/dt at time `t`.
    pub fn contributions(&self, t: f64, state: &KineticsState) -> SimResult<Contributions> {
        self.kinetics.check_len(state.len())?;
        Ok(self
            .kinetics
            .contributions(self.reactivity.evaluate(t), state))
    }

    /// Precursor concentrations relative to their steady-state values.
    pub fn relative_precursors(&self, state: &KineticsState) -> Vec<f64> {
        state
            .precursors()
            .iter()
            .zip(self.initial.precursors())
            .map(|(c, c0)| if *c0 > 0.0 { c / c0 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::{Step, StepSchedule};

    const KEEPIN_LAMBDA: f64 = 1e-7 / 0.0035;

    fn keepin_solver(rho: f64) -> KineticsSolver {
        KineticsSolver::new(
            DelayedNeutronData::keepin_u235(),
            HeldReactivity::new(rho),
            KEEPIN_LAMBDA,
        )
        .unwrap()
    }

    #[test]
    fn zero_reactivity_holds_steady() {
        let mut solver = keepin_solver(0.0);
        let traj = solver.solve(0.0, 20.0).unwrap();
        assert_eq!(traj.first().unwrap().t, 0.0);
        assert_eq!(traj.last().unwrap().t, 20.0);
        for n in traj.neutron_density() {
            assert!((n - 1.0).abs() < 1e-6, "n drifted to {n}");
        }
    }

    #[test]
    fn steady_derivative_vanishes() {
        let solver = keepin_solver(0.0);
        let d = solver.derivative(0.0, solver.initial_state()).unwrap();
        let scale = 1.0 / solver.generation_time();
        assert!(d.as_vector().iter().all(|v| v.abs() <= 1e-12 * scale));
    }

    #[test]
    fn solve_continues_from_last_sample() {
        let mut solver = keepin_solver(0.1);
        let first = solver.solve(0.0, 1.0).unwrap();
        let end_state = first.last().unwrap().state.clone();
        assert_eq!(solver.state(), &end_state);

        let second = solver.solve(1.0, 2.0).unwrap();
        assert_eq!(second.first().unwrap().state, &end_state);
        assert!(second.last().unwrap().neutron_density() > end_state.neutron_density());
    }

    #[test]
    fn failed_solve_keeps_state() {
        let opts = AdaptiveOptions {
            max_steps: 2,
            max_step: Some(1e-3),
            ..AdaptiveOptions::default()
        };
        let mut solver = KineticsSolver::with_options(
            DelayedNeutronData::keepin_u235(),
            HeldReactivity::new(0.5),
            KEEPIN_LAMBDA,
            opts,
        )
        .unwrap();
        let before = solver.state().clone();
        let err = solver.solve(0.0, 10.0).unwrap_err();
        assert!(matches!(err, SimError::IntegrationFailure { .. }));
        assert_eq!(solver.state(), &before);
    }

    #[test]
    fn set_state_checks_length() {
        let mut solver = keepin_solver(0.0);
        let bad = KineticsState::from_parts(1.0, &[1.0]);
        assert!(matches!(
            solver.set_state(bad),
            Err(SimError::StateMismatch {
                expected: 7,
                actual: 2
            })
        ));
        let nan = KineticsState::from_parts(f64::NAN, &[0.0; 6]);
        assert!(solver.set_state(nan).is_err());
    }

    #[test]
    fn relative_precursors_start_at_one() {
        let solver = keepin_solver(0.0);
        let rel = solver.relative_precursors(solver.initial_state());
        assert_eq!(rel.len(), 6);
        assert!(rel.iter().all(|r| (r - 1.0).abs() < 1e-12));
    }

    #[test]
    fn stepped_schedule_rises_then_falls() {
        let sched = StepSchedule::new(
            0.0,
            vec![
                Step { t: 0.0, rho: 0.1 },
                Step { t: 1.0, rho: -0.1 },
                Step { t: 2.0, rho: 0.05 },
            ],
        )
        .unwrap();
        let mut solver =
            KineticsSolver::new(DelayedNeutronData::keepin_u235(), sched, KEEPIN_LAMBDA).unwrap();
        let traj = solver.solve(0.0, 5.0).unwrap();
        let at = |t: f64| {
            let i = traj.times().iter().position(|&s| s >= t).unwrap();
            traj.states()[i].neutron_density()
        };
        assert!(at(0.9) > 1.05);
        assert!(at(1.9) < at(0.9));
        assert!(traj.states().iter().all(KineticsState::is_non_negative));
    }

    #[test]
    fn invalid_configuration_detected_at_construction() {
        let data = DelayedNeutronData::keepin_u235();
        assert!(matches!(
            KineticsSolver::new(data.clone(), HeldReactivity::default(), 0.0),
            Err(SimError::InvalidConfiguration { .. })
        ));
        let opts = AdaptiveOptions {
            atol: -1.0,
            ..AdaptiveOptions::default()
        };
        assert!(matches!(
            KineticsSolver::with_options(data, HeldReactivity::default(), KEEPIN_LAMBDA, opts),
            Err(SimError::InvalidConfiguration { .. })
        ));
    }
}
