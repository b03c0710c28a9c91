//! Adaptive stiff time integration.
//!
//! [`Rosenbrock23`] is the linearly implicit, L-stable Rosenbrock pair of
//! Shampine and Reichelt (order 2 with an order-3 error estimate). Each step
//! factors `W = I - h*d*J` once and reuses it for all three stages, so no
//! Newton iteration is needed. This is what makes the prompt-neutron
//! timescale (~1e-5) and precursor timescales (~1e2) tractable in one solve.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::model::TransientModel;

/// Step-size control settings for adaptive integration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveOptions {
    /// Relative error tolerance per component
    pub rtol: f64,
    /// Absolute error tolerance per component
    pub atol: f64,
    /// Maximum number of step attempts (accepted + rejected) per integration
    pub max_steps: usize,
    /// Upper bound on the step size, `None` for unbounded
    pub max_step: Option<f64>,
    /// First trial step, `None` to estimate from the initial derivative
    pub initial_step: Option<f64>,
    /// Absolute floor on the step size before giving up
    pub min_step: f64,
    /// Safety factor applied to the optimal step estimate
    pub safety: f64,
    /// Largest step growth factor after an accepted step
    pub max_growth: f64,
    /// Smallest step shrink factor after a rejected step
    pub min_shrink: f64,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 100_000,
            max_step: None,
            initial_step: None,
            min_step: 1e-14,
            safety: 0.8,
            max_growth: 5.0,
            min_shrink: 0.2,
        }
    }
}

impl AdaptiveOptions {
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        fn positive(v: f64, what: &str) -> SimResult<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SimError::config(format!("{what} must be finite and positive, got {v}")))
            }
        }
        positive(self.rtol, "rtol")?;
        positive(self.atol, "atol")?;
        positive(self.min_step, "min_step")?;
        if let Some(h) = self.max_step {
            positive(h, "max_step")?;
        }
        if let Some(h) = self.initial_step {
            positive(h, "initial_step")?;
        }
        if self.max_steps == 0 {
            return Err(SimError::config("max_steps must be positive"));
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return Err(SimError::config("safety must be in (0, 1]"));
        }
        if !(self.max_growth.is_finite() && self.max_growth > 1.0) {
            return Err(SimError::config("max_growth must be finite and > 1"));
        }
        if !(self.min_shrink > 0.0 && self.min_shrink <= 0.5) {
            return Err(SimError::config("min_shrink must be in (0, 0.5]"));
        }
        Ok(())
    }
}

/// Work counters for one integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    pub rhs_evals: usize,
    pub jacobian_evals: usize,
}

/// Record of an integration: one sample per accepted step.
#[derive(Clone, Debug)]
pub struct SimRecord {
    /// Time points, starting at `t0` and ending exactly at `t1`
    pub t: Vec<f64>,
    /// State snapshots
    pub x: Vec<DVector<f64>>,
    pub stats: IntegrationStats,
}

/// Trait for adaptive time integrators.
pub trait Integrator {
    /// Integrate `model` from `(t0, x0)` to `t1`.
    fn integrate<M: TransientModel>(
        &self,
        model: &mut M,
        t0: f64,
        t1: f64,
        x0: &DVector<f64>,
    ) -> SimResult<SimRecord>;
}

/// Shampine-Reichelt Rosenbrock 2(3) method ("ode23s").
#[derive(Clone, Debug, Default)]
pub struct Rosenbrock23 {
    pub options: AdaptiveOptions,
}

/// Outcome of a single step attempt.
struct Attempt {
    x_new: DVector<f64>,
    f_new: DVector<f64>,
    err: f64,
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

impl Rosenbrock23 {
    pub fn new(options: AdaptiveOptions) -> Self {
        Self { options }
    }

    /// Hairer-style starting step from the scaled initial state and slope.
    fn initial_step(&self, x: &DVector<f64>, f: &DVector<f64>) -> f64 {
        let opts = &self.options;
        let n = x.len().max(1) as f64;
        let mut d0 = 0.0;
        let mut d1 = 0.0;
        for (xi, fi) in x.iter().zip(f.iter()) {
            let sc = opts.atol + opts.rtol * xi.abs();
            d0 += (xi / sc).powi(2);
            d1 += (fi / sc).powi(2);
        }
        let d0 = (d0 / n).sqrt();
        let d1 = (d1 / n).sqrt();
        if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
    }

    /// Mixed absolute/relative error norm (max over components).
    fn error_norm(&self, err: &DVector<f64>, x: &DVector<f64>, x_new: &DVector<f64>) -> f64 {
        let opts = &self.options;
        err.iter()
            .zip(x.iter().zip(x_new.iter()))
            .map(|(e, (a, b))| {
                let sc = opts.atol.max(opts.rtol * a.abs().max(b.abs()));
                e.abs() / sc
            })
            .fold(0.0, f64::max)
    }

    /// One trial step. `None` when W is singular or a stage blows up.
    #[allow(clippy::too_many_arguments)]
    fn attempt<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        h: f64,
        x: &DVector<f64>,
        f0: &DVector<f64>,
        jac: &DMatrix<f64>,
        dfdt: Option<&DVector<f64>>,
        stats: &mut IntegrationStats,
    ) -> SimResult<Option<Attempt>> {
        let d = 1.0 / (2.0 + std::f64::consts::SQRT_2);
        let e32 = 6.0 + std::f64::consts::SQRT_2;

        let n = x.len();
        let w = DMatrix::<f64>::identity(n, n) - jac * (h * d);
        let lu = w.lu();

        let mut rhs1 = f0.clone();
        if let Some(tdot) = dfdt {
            rhs1 += tdot * (h * d);
        }
        let Some(k1) = lu.solve(&rhs1) else {
            return Ok(None);
        };

        let x1 = x + &k1 * (0.5 * h);
        let f1 = model.rhs(t + 0.5 * h, &x1)?;
        stats.rhs_evals += 1;
        if !all_finite(&f1) {
            return Ok(None);
        }
        let Some(k2) = lu.solve(&(&f1 - &k1)) else {
            return Ok(None);
        };
        let k2 = k2 + &k1;

        let x_new = x + &k2 * h;
        let f_new = model.rhs(t + h, &x_new)?;
        stats.rhs_evals += 1;
        if !all_finite(&x_new) || !all_finite(&f_new) {
            return Ok(None);
        }

        let mut rhs3 = &f_new - (&k2 - &f1) * e32 - (&k1 - f0) * 2.0;
        if let Some(tdot) = dfdt {
            rhs3 += tdot * (h * d);
        }
        let Some(k3) = lu.solve(&rhs3) else {
            return Ok(None);
        };

        let err_vec = (&k1 - &k2 * 2.0 + &k3) * (h / 6.0);
        let err = self.error_norm(&err_vec, x, &x_new);
        Ok(Some(Attempt { x_new, f_new, err }))
    }
}

impl Integrator for Rosenbrock23 {
    fn integrate<M: TransientModel>(
        &self,
        model: &mut M,
        t0: f64,
        t1: f64,
        x0: &DVector<f64>,
    ) -> SimResult<SimRecord> {
        let opts = &self.options;
        opts.validate()?;
        if !t0.is_finite() || !t1.is_finite() {
            return Err(SimError::arg(format!(
                "integration bounds must be finite, got [{t0}, {t1}]"
            )));
        }
        if t1 <= t0 {
            return Err(SimError::arg(format!(
                "end time {t1} must be after start time {t0}"
            )));
        }
        if x0.len() != model.dim() {
            return Err(SimError::StateMismatch {
                expected: model.dim(),
                actual: x0.len(),
            });
        }
        if !all_finite(x0) {
            return Err(SimError::failure(t0, "non-finite initial state"));
        }

        let mut stats = IntegrationStats::default();
        let mut t = t0;
        let mut x = x0.clone();
        let mut f0 = model.rhs(t, &x)?;
        stats.rhs_evals += 1;
        if !all_finite(&f0) {
            return Err(SimError::failure(t, "non-finite derivative"));
        }

        let span = t1 - t0;
        let max_step = opts.max_step.map_or(span, |h| h.min(span));
        let mut h = opts
            .initial_step
            .unwrap_or_else(|| self.initial_step(&x, &f0))
            .min(max_step);

        let mut t_record = vec![t];
        let mut x_record = vec![x.clone()];

        let mut jac = model.jacobian(t, &x)?;
        let mut dfdt = model.time_derivative(t, &x)?;
        stats.jacobian_evals += 1;
        let mut rejected_last = false;
        let mut attempts = 0;

        while t < t1 {
            if attempts >= opts.max_steps {
                return Err(SimError::failure(
                    t,
                    format!("exceeded {} step attempts", opts.max_steps),
                ));
            }
            attempts += 1;

            let h_min = opts.min_step.max(16.0 * f64::EPSILON * t.abs());
            h = h.min(max_step).max(h_min);
            // Stretch onto t1 rather than leave a sliver, never past max_step.
            let last = t1 - t <= (1.1 * h).min(max_step * (1.0 + 1e-9));
            if last {
                h = t1 - t;
            }

            let attempt =
                self.attempt(model, t, h, &x, &f0, &jac, dfdt.as_ref(), &mut stats)?;

            match attempt {
                Some(a) if a.err.is_finite() && a.err <= 1.0 => {
                    t = if last { t1 } else { t + h };
                    x = a.x_new;
                    f0 = a.f_new;
                    t_record.push(t);
                    x_record.push(x.clone());
                    stats.accepted += 1;

                    let mut factor = if a.err == 0.0 {
                        opts.max_growth
                    } else {
                        (opts.safety * a.err.powf(-1.0 / 3.0)).clamp(opts.min_shrink, opts.max_growth)
                    };
                    if rejected_last {
                        factor = factor.min(1.0);
                    }
                    h *= factor;
                    rejected_last = false;

                    if t < t1 {
                        jac = model.jacobian(t, &x)?;
                        dfdt = model.time_derivative(t, &x)?;
                        stats.jacobian_evals += 1;
                    }
                }
                other => {
                    stats.rejected += 1;
                    if h <= h_min {
                        return Err(SimError::failure(
                            t,
                            format!("step size underflow (h={h:e})"),
                        ));
                    }
                    let factor = match other {
                        Some(a) if a.err.is_finite() => {
                            (opts.safety * a.err.powf(-1.0 / 3.0)).min(0.5).max(opts.min_shrink)
                        }
                        _ => opts.min_shrink,
                    };
                    h *= factor;
                    rejected_last = true;
                }
            }
        }

        Ok(SimRecord {
            t: t_record,
            x: x_record,
            stats,
        })
    }
}
