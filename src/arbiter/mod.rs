//! Arbiter runtime
//!
//! Wires the state machine to a capture device, a playback notifier, and
//! the owner's callbacks, and runs it as a single task.

mod driver;
mod mount;
#[cfg(test)]
mod testing;

pub use driver::{Arbiter, Callbacks, ResultSink};
pub use mount::{mount, ArbiterHandle, MountedArbiter};
