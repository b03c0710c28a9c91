//! Inhour equation for the point-kinetics system.
//!
//! With reactivity in dollars, an exponential solution `n ~ exp(w t)` exists
//! when
//!
//! ```text
//! rho(w) = w*Lambda + sum_i a_i * w / (w + lambda_i)
//! ```
//!
//! `rho(w)` increases monotonically on `(-lambda_min, inf)`, so the dominant
//! root (inverse asymptotic period) is unique there and found by bisection.

use crate::error::{SimError, SimResult};
use crate::kinetics::PointKinetics;

const MAX_BISECTIONS: usize = 400;

/// Reactivity that produces asymptotic inverse period `omega`.
pub fn reactivity_for_period(kinetics: &PointKinetics, omega: f64) -> f64 {
    let delayed: f64 = kinetics
        .relative_yields()
        .iter()
        .zip(kinetics.decay_constants())
        .map(|(a, l)| a * omega / (omega + l))
        .sum();
    omega * kinetics.generation_time() + delayed
}

/// Dominant root of the inhour equation for a reactivity step `rho`.
///
/// Positive for supercritical steps, negative (but above the slowest
/// contributing decay constant) for subcritical ones, zero at `rho = 0`.
pub fn dominant_root(kinetics: &PointKinetics, rho: f64) -> SimResult<f64> {
    if !rho.is_finite() {
        return Err(SimError::arg(format!("reactivity must be finite, got {rho}")));
    }
    if rho == 0.0 {
        return Ok(0.0);
    }

    // Slowest group with a non-zero yield sets the pole bounding the root.
    let pole = kinetics
        .relative_yields()
        .iter()
        .zip(kinetics.decay_constants())
        .filter(|(a, _)| **a > 0.0)
        .map(|(_, l)| *l)
        .fold(f64::INFINITY, f64::min);

    let (mut lo, mut hi) = if rho > 0.0 {
        let mut hi = 1.0;
        let mut grown = 0;
        while reactivity_for_period(kinetics, hi) < rho {
            hi *= 2.0;
            grown += 1;
            if grown > 2_000 || !hi.is_finite() {
                return Err(SimError::failure(0.0, "could not bracket inhour root"));
            }
        }
        (0.0, hi)
    } else {
        (-pole, 0.0)
    };

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if reactivity_for_period(kinetics, mid) < rho {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(0.5 * (lo + hi))
}

/// Asymptotic reactor period `1/omega`; infinite at critical.
pub fn asymptotic_period(kinetics: &PointKinetics, rho: f64) -> SimResult<f64> {
    let omega = dominant_root(kinetics, rho)?;
    Ok(if omega == 0.0 { f64::INFINITY } else { 1.0 / omega })
}
