//! kp-session: real-time interactive point-kinetics sessions.
//!
//! An [`InteractiveSession`] keeps a pre-computed future trajectory and a
//! growing past. A [`TimeSource`] decides how much of the future has
//! happened; every reactivity change throws the unconsumed future away and
//! re-solves from the last consumed state.

pub mod clock;
pub mod config;
pub mod error;
pub mod observer;
pub mod session;

pub use clock::{ManualClock, TimeSource, WallClock};
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use observer::{SessionEvent, SessionObserver};
pub use session::{
    FutureView, InteractiveSession, ReactivityChange, SessionPhase, SolveStats, StepOutcome,
};
