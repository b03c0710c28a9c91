//! kp-core: shared foundation for keepinpace.
//!
//! Contains:
//! - numeric (tolerances + float helpers)
//! - data (delayed-neutron precursor groups, the kinetics input contract)
//! - timing (opt-in wall-clock instrumentation)
//! - error (shared error types)

pub mod data;
pub mod error;
pub mod numeric;
pub mod timing;

pub use data::{DelayedNeutronData, PrecursorGroup};
pub use error::{CoreError, CoreResult};
pub use numeric::*;
