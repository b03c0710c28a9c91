//! TransientModel trait for pluggable stiff systems.

use nalgebra::{DMatrix, DVector};

use crate::error::SimResult;

/// A first-order ODE system `x_dot = f(t, x)` with an available Jacobian.
///
/// The integrator only talks to physics through this trait, so it can be
/// exercised on small analytic problems as well as on point kinetics.
///
/// Note: methods take `&mut self` so models may cache between evaluations.
pub trait TransientModel {
    /// Number of state variables.
    fn dim(&self) -> usize;

    /// Compute state derivative dxdt = f(t, x).
    fn rhs(&mut self, t: f64, x: &DVector<f64>) -> SimResult<DVector<f64>>;

    /// Jacobian df/dx at (t, x), a `dim x dim` matrix.
    fn jacobian(&mut self, t: f64, x: &DVector<f64>) -> SimResult<DMatrix<f64>>;

    /// Explicit time derivative df/dt at (t, x).
    ///
    /// `None` means the forcing is treated as constant over a step.
    fn time_derivative(&mut self, _t: f64, _x: &DVector<f64>) -> SimResult<Option<DVector<f64>>> {
        Ok(None)
    }
}
