//! The interactive session: past/future bookkeeping around a kinetics solver.

use kp_core::DelayedNeutronData;
use kp_core::timing::CallTimer;
use kp_sim::{
    Contributions, HeldReactivity, IntegrationStats, KineticsSolver, KineticsState, Sample,
    Trajectory, prompt_jump,
};

use crate::clock::{TimeSource, WallClock};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::observer::{SessionEvent, SessionObserver};

/// Whether the session currently has a future to consume.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Tracking,
    /// The future is empty; only a re-solve leaves this phase.
    Exhausted,
}

/// What one call to [`InteractiveSession::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The future was already empty. Nothing happened.
    Exhausted,
    /// `consumed` samples moved to the past; `resolved` is set when the
    /// future drained and was recomputed.
    Advanced { consumed: usize, resolved: bool },
}

/// Result of [`InteractiveSession::set_reactivity`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReactivityChange {
    pub previous: f64,
    pub current: f64,
    /// Prompt-jump estimate of the neutron density after the change.
    pub prompt_jump: Option<f64>,
}

/// Timing of the solves a session has run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub solves: u64,
    pub total_seconds: f64,
    pub average_seconds: f64,
    /// Integrator counters of the most recent successful solve.
    pub last: IntegrationStats,
}

/// Borrowed view of the unconsumed part of the future.
#[derive(Clone, Copy, Debug)]
pub struct FutureView<'a> {
    solution: &'a Trajectory,
    cursor: usize,
}

impl<'a> FutureView<'a> {
    pub fn times(&self) -> &'a [f64] {
        &self.solution.times()[self.cursor..]
    }

    pub fn states(&self) -> &'a [KineticsState] {
        &self.solution.states()[self.cursor..]
    }

    pub fn neutron_density(&self) -> Vec<f64> {
        self.states()
            .iter()
            .map(KineticsState::neutron_density)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.solution.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn earliest(&self) -> Option<Sample<'a>> {
        self.solution.sample(self.cursor)
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample<'a>> + 'a {
        let solution = self.solution;
        (self.cursor..solution.len()).filter_map(move |i| solution.sample(i))
    }
}

/// A point-kinetics simulation that tracks a clock.
///
/// The session keeps the most recent solver output and a cursor into it.
/// Samples before the cursor have been consumed into `past`; the rest is the
/// future. [`step`](Self::step) advances the cursor as the clock catches up.
/// [`set_reactivity`](Self::set_reactivity) discards the unconsumed future and
/// re-solves from the last consumed state, so simulated time never rewinds.
pub struct InteractiveSession<C: TimeSource = WallClock> {
    solver: KineticsSolver<HeldReactivity>,
    config: SessionConfig,
    clock: C,
    start: f64,
    past: Trajectory,
    solution: Trajectory,
    cursor: usize,
    observers: Vec<Box<dyn SessionObserver>>,
    solve_timer: CallTimer,
}

impl InteractiveSession<WallClock> {
    /// Session driven by real time, one unit per second.
    pub fn with_wall_clock(
        data: DelayedNeutronData,
        generation_time: f64,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        Self::new(data, generation_time, config, WallClock::new())
    }
}

impl<C: TimeSource> InteractiveSession<C> {
    /// Build the solver at critical, solve `[0, horizon]` and start the clock.
    pub fn new(
        data: DelayedNeutronData,
        generation_time: f64,
        config: SessionConfig,
        clock: C,
    ) -> SessionResult<Self> {
        config.validate()?;
        let mut solver = KineticsSolver::with_options(
            data,
            HeldReactivity::new(0.0),
            generation_time,
            config.solver_options(),
        )?;
        let mut solve_timer = CallTimer::default();
        let solution = solve_timer.measure(|| solver.solve(0.0, config.horizon))?;
        let start = clock.now();

        tracing::info!(
            groups = solver.kinetics().num_groups(),
            generation_time,
            horizon = config.horizon,
            samples = solution.len(),
            "session started"
        );

        Ok(Self {
            solver,
            config,
            clock,
            start,
            past: Trajectory::new(),
            solution,
            cursor: 0,
            observers: Vec::new(),
            solve_timer,
        })
    }

    /// Simulation time elapsed since the session started.
    pub fn current_elapsed(&self) -> f64 {
        self.clock.now() - self.start
    }

    /// Consume every future sample whose time has come.
    pub fn step(&mut self) -> SessionResult<StepOutcome> {
        if self.cursor >= self.solution.len() {
            return Ok(StepOutcome::Exhausted);
        }

        let now = self.current_elapsed();
        let consumed = self.consume_until(now)?;

        let mut resolved = false;
        if self.cursor >= self.solution.len() {
            tracing::debug!(now, "future drained, re-solving");
            self.recompute_future(self.config.horizon)?;
            resolved = true;
        }
        Ok(StepOutcome::Advanced { consumed, resolved })
    }

    /// Move every future sample at or before `now` into the past.
    fn consume_until(&mut self, now: f64) -> SessionResult<usize> {
        let mut consumed = 0;
        while let Some(sample) = self.solution.sample(self.cursor) {
            if sample.t > now {
                break;
            }
            // A fresh future can begin on the instant already in the past.
            let duplicate = self.past.last_time().is_some_and(|last| sample.t <= last);
            if !duplicate {
                self.past.push(sample.t, sample.state.clone())?;
            }
            self.cursor += 1;
            consumed += 1;
        }

        if consumed > 0 {
            self.notify(SessionEvent::Advanced {
                now,
                consumed,
                past_len: self.past.len(),
                future_len: self.solution.len() - self.cursor,
            });
        }
        Ok(consumed)
    }

    /// Hold reactivity `rho` (dollars) from now on and re-solve the future.
    pub fn set_reactivity(&mut self, rho: f64) -> SessionResult<ReactivityChange> {
        if !rho.is_finite() {
            return Err(SessionError::InvalidArgument {
                what: format!("reactivity must be finite, got {rho}"),
            });
        }
        let now = self.current_elapsed();
        self.consume_until(now)?;
        let n = self.continuation().1.neutron_density();
        let previous = self.solver.reactivity_mut().set(rho);
        let change = ReactivityChange {
            previous,
            current: rho,
            prompt_jump: prompt_jump(previous, rho, n),
        };
        tracing::info!(previous, current = rho, "reactivity changed");
        self.recompute_future(self.config.horizon)?;
        Ok(change)
    }

    /// Replace the future with a fresh solve of length `duration` starting now.
    ///
    /// Samples the clock has already passed are consumed first, so the solve
    /// continues from the latest state at or before now. On failure the old
    /// future is already gone and the session is [`SessionPhase::Exhausted`].
    pub fn recompute_future(&mut self, duration: f64) -> SessionResult<()> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(SessionError::InvalidArgument {
                what: format!("future duration must be finite and positive, got {duration}"),
            });
        }

        let now = self.current_elapsed();
        self.consume_until(now)?;
        let (anchor_t, anchor) = self.continuation();
        let anchor = anchor.clone();
        let start = now.max(anchor_t);
        self.solver.set_state(anchor)?;

        self.solution = Trajectory::new();
        self.cursor = 0;

        let result = self
            .solve_timer
            .measure(|| self.solver.solve(start, start + duration));
        match result {
            Ok(solution) => {
                self.solution = solution;
                let reactivity = self.current_reactivity();
                self.notify(SessionEvent::FutureReplaced {
                    start,
                    end: start + duration,
                    samples: self.solution.len(),
                    reactivity,
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(now, error = %e, "re-solve failed, session exhausted");
                self.notify(SessionEvent::ResolveFailed {
                    now,
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Time and state the next solve continues from.
    ///
    /// The last consumed sample of the current solution, or its first sample
    /// if nothing has been consumed yet. With no solution at all (after a
    /// failed re-solve) this falls back to the past, then to steady state.
    fn continuation(&self) -> (f64, &KineticsState) {
        let idx = self.cursor.saturating_sub(1);
        if let Some(sample) = self.solution.sample(idx) {
            return (sample.t, sample.state);
        }
        if let Some(sample) = self.past.last() {
            return (sample.t, sample.state);
        }
        (0.0, self.solver.initial_state())
    }

    fn notify(&mut self, event: SessionEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn past(&self) -> &Trajectory {
        &self.past
    }

    pub fn future(&self) -> FutureView<'_> {
        FutureView {
            solution: &self.solution,
            cursor: self.cursor.min(self.solution.len()),
        }
    }

    pub fn earliest_future(&self) -> SessionResult<Sample<'_>> {
        self.solution
            .sample(self.cursor)
            .ok_or(SessionError::EmptyFutureAccess)
    }

    pub fn current_reactivity(&self) -> f64 {
        self.solver.reactivity().get()
    }

    pub fn phase(&self) -> SessionPhase {
        if self.cursor < self.solution.len() {
            SessionPhase::Tracking
        } else {
            SessionPhase::Exhausted
        }
    }

    /// Last consumed state, or the state the future starts from.
    pub fn current_state(&self) -> &KineticsState {
        match self.past.last() {
            Some(sample) => sample.state,
            None => self.continuation().1,
        }
    }

    /// Sources of dn/dt at the current state and reactivity.
    pub fn contributions(&self) -> Contributions {
        self.solver
            .kinetics()
            .contributions(self.current_reactivity(), self.current_state())
    }

    pub fn solver(&self) -> &KineticsSolver<HeldReactivity> {
        &self.solver
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn solve_stats(&self) -> SolveStats {
        SolveStats {
            solves: self.solve_timer.count(),
            total_seconds: self.solve_timer.total_seconds(),
            average_seconds: self.solve_timer.average_seconds(),
            last: self.solver.last_stats(),
        }
    }
}

impl<C: TimeSource + std::fmt::Debug> std::fmt::Debug for InteractiveSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveSession")
            .field("clock", &self.clock)
            .field("start", &self.start)
            .field("reactivity", &self.current_reactivity())
            .field("past", &self.past.len())
            .field("future", &self.future().len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const KEEPIN_LAMBDA: f64 = 1e-7 / 0.0035;

    fn session(horizon: f64) -> InteractiveSession<ManualClock> {
        InteractiveSession::new(
            DelayedNeutronData::keepin_u235(),
            KEEPIN_LAMBDA,
            SessionConfig::default().with_horizon(horizon),
            ManualClock::new(0.0),
        )
        .unwrap()
    }

    #[test]
    fn starts_tracking_with_full_future() {
        let s = session(20.0);
        assert_eq!(s.phase(), SessionPhase::Tracking);
        assert!(s.past().is_empty());
        assert_eq!(s.future().times()[0], 0.0);
        assert_eq!(*s.future().times().last().unwrap(), 20.0);
        assert_eq!(s.current_reactivity(), 0.0);
        assert_eq!(s.solve_stats().solves, 1);
    }

    #[test]
    fn step_at_time_zero_consumes_first_sample() {
        let mut s = session(20.0);
        let outcome = s.step().unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Advanced {
                consumed: 1,
                resolved: false
            }
        );
        assert_eq!(s.past().times(), &[0.0]);
        assert!(s.earliest_future().unwrap().t > 0.0);
    }

    #[test]
    fn future_spacing_is_capped() {
        let s = session(5.0);
        let times = s.future().times();
        for w in times.windows(2) {
            assert!(w[1] - w[0] <= 0.05 * (1.0 + 1e-9));
        }
    }

    #[test]
    fn set_reactivity_reports_prompt_jump() {
        let mut s = session(5.0);
        let change = s.set_reactivity(0.5).unwrap();
        assert_eq!(change.previous, 0.0);
        assert_eq!(change.current, 0.5);
        assert!((change.prompt_jump.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(s.current_reactivity(), 0.5);
        assert_eq!(s.phase(), SessionPhase::Tracking);
    }

    #[test]
    fn rejects_non_finite_reactivity() {
        let mut s = session(5.0);
        assert!(matches!(
            s.set_reactivity(f64::NAN),
            Err(SessionError::InvalidArgument { .. })
        ));
        assert_eq!(s.current_reactivity(), 0.0);
    }

    #[test]
    fn rejects_bad_duration() {
        let mut s = session(5.0);
        assert!(s.recompute_future(0.0).is_err());
        assert!(s.recompute_future(f64::INFINITY).is_err());
        assert_eq!(s.phase(), SessionPhase::Tracking);
    }

    #[test]
    fn contributions_balance_at_steady_state() {
        let s = session(5.0);
        let c = s.contributions();
        let scale = 1.0 / KEEPIN_LAMBDA;
        assert!(c.net().abs() <= 1e-9 * scale);
    }

    #[test]
    fn invalid_configuration_rejected() {
        let err = InteractiveSession::new(
            DelayedNeutronData::keepin_u235(),
            KEEPIN_LAMBDA,
            SessionConfig::default().with_horizon(-1.0),
            ManualClock::new(0.0),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration { .. }));

        let err = InteractiveSession::new(
            DelayedNeutronData::keepin_u235(),
            0.0,
            SessionConfig::default(),
            ManualClock::new(0.0),
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::Sim(_)));
    }
}
