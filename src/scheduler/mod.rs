//! Rate-limited execution of corrective actions.
//!
//! [`GlobalGate`] serializes outbound mutations system-wide, [`TaskQueues`]
//! serializes work per conversation, and [`DelayScheduler`] decides how long a
//! finished correction keeps its slot.

pub mod delay;
pub mod gate;
pub mod queue;

pub use delay::{DelayScheduler, Pace, pace_for};
pub use gate::{GatePermit, GlobalGate};
pub use queue::{Correction, CorrectionHandler, TaskQueues};
