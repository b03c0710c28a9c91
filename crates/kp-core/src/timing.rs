//! Wall-clock timing for solves.
//!
//! [`Timer`] logs one span through `tracing`, and only when timing is switched
//! on with [`enable_timing`] or the `KP_TIMING` environment variable.
//! [`CallTimer`] always tallies, so a session can report its re-solve cost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static FORCED: AtomicBool = AtomicBool::new(false);

/// Turn on [`Timer`] logging for the rest of the process.
pub fn enable_timing() {
    FORCED.store(true, Ordering::Relaxed);
}

fn timing_on() -> bool {
    FORCED.load(Ordering::Relaxed) || std::env::var_os("KP_TIMING").is_some()
}

/// One labelled span. `None` start means timing was off when it began.
pub struct Timer {
    label: &'static str,
    started: Option<Instant>,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: timing_on().then(Instant::now),
        }
    }

    pub fn stop_and_log(self) {
        if let Some(started) = self.started {
            let elapsed_s = started.elapsed().as_secs_f64();
            tracing::info!(label = self.label, elapsed_s, "timing");
        }
    }
}

/// Running total of time spent in repeated calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallTimer {
    total: Duration,
    calls: u64,
}

impl CallTimer {
    /// Run `f`, adding its wall time to the tally.
    pub fn measure<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.total += started.elapsed();
        self.calls += 1;
        out
    }

    pub fn count(&self) -> u64 {
        self.calls
    }

    pub fn total_seconds(&self) -> f64 {
        self.total.as_secs_f64()
    }

    /// Zero before the first call.
    pub fn average_seconds(&self) -> f64 {
        match self.calls {
            0 => 0.0,
            n => self.total_seconds() / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_timer_tallies_each_call() {
        let mut timer = CallTimer::default();
        assert_eq!(timer.average_seconds(), 0.0);

        let v = timer.measure(|| 41 + 1);
        assert_eq!(v, 42);
        timer.measure(|| std::thread::sleep(Duration::from_millis(2)));

        assert_eq!(timer.count(), 2);
        assert!(timer.total_seconds() >= 0.002);
        assert!((timer.average_seconds() * 2.0 - timer.total_seconds()).abs() < 1e-12);
    }

    #[test]
    fn enabled_timer_captures_a_start() {
        enable_timing();
        let timer = Timer::start("test");
        assert!(timer.started.is_some());
        timer.stop_and_log();
    }
}
