//! Time sources that drive a session.
//!
//! The session never reads the system clock directly. It asks a
//! [`TimeSource`] for "now", so tests and scripted drivers can substitute a
//! [`ManualClock`] for the real [`WallClock`].

use std::time::Instant;

use kp_core::ensure_positive;

use crate::error::{SessionError, SessionResult};

/// Monotonic source of the current time in simulation units.
pub trait TimeSource {
    fn now(&self) -> f64;
}

impl<T: TimeSource + ?Sized> TimeSource for Box<T> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Real elapsed time since construction, optionally sped up or slowed down.
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: Instant,
    time_scale: f64,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock {
    /// One simulation unit per wall-clock second.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            time_scale: 1.0,
        }
    }

    /// `time_scale` simulation units per wall-clock second.
    pub fn with_time_scale(time_scale: f64) -> SessionResult<Self> {
        let time_scale = ensure_positive(time_scale, "time scale")?;
        Ok(Self {
            origin: Instant::now(),
            time_scale,
        })
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * self.time_scale
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualClock {
    now: f64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: start }
    }

    /// Move forward by `dt >= 0`.
    pub fn advance(&mut self, dt: f64) -> SessionResult<()> {
        self.set(self.now + dt)
    }

    /// Jump to absolute time `t`, which must not be earlier than now.
    pub fn set(&mut self, t: f64) -> SessionResult<()> {
        if !t.is_finite() || t < self.now {
            return Err(SessionError::ClockRegression {
                from: self.now,
                to: t,
            });
        }
        self.now = t;
        Ok(())
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_forward_only() {
        let mut clock = ManualClock::new(1.0);
        clock.advance(0.5).unwrap();
        assert_eq!(clock.now(), 1.5);
        clock.set(2.0).unwrap();
        assert_eq!(clock.now(), 2.0);
        assert!(matches!(
            clock.set(1.0),
            Err(SessionError::ClockRegression { .. })
        ));
        assert!(clock.advance(-0.1).is_err());
        assert!(clock.advance(f64::NAN).is_err());
        assert_eq!(clock.now(), 2.0);
    }

    #[test]
    fn wall_clock_advances() {
        let clock = WallClock::with_time_scale(10.0).unwrap();
        let a = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now();
        assert!(b > a);
        assert!(b >= 0.05 * 0.9);
    }

    #[test]
    fn wall_clock_rejects_bad_scale() {
        assert!(WallClock::with_time_scale(0.0).is_err());
        assert!(WallClock::with_time_scale(f64::INFINITY).is_err());
    }

    #[test]
    fn boxed_sources() {
        let clock: Box<dyn TimeSource> = Box::new(ManualClock::new(3.0));
        assert_eq!(clock.now(), 3.0);
    }
}
