//! Point-kinetics integration for keepinpace.
//!
//! Provides:
//! - The point-kinetics model (neutron density + precursor groups)
//! - Adaptive Rosenbrock 2(3) integrator for the stiff system
//! - `KineticsSolver` with continuation between solves
//! - Reactivity sources (held value, step schedules, closures)
//! - Inhour-equation reference roots and kinetic diagnostics

pub mod error;
pub mod inhour;
pub mod integrator;
pub mod kinetics;
pub mod model;
pub mod reactivity;
pub mod solver;
pub mod trajectory;

// Re-exports for public API
pub use error::{SimError, SimResult};
pub use integrator::{AdaptiveOptions, IntegrationStats, Integrator, Rosenbrock23, SimRecord};
pub use kinetics::{Contributions, KineticsState, PointKinetics, prompt_jump};
pub use model::TransientModel;
pub use reactivity::{HeldReactivity, ReactivitySource, Step, StepSchedule};
pub use solver::KineticsSolver;
pub use trajectory::{Sample, Trajectory};
