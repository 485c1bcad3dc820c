//! State machine module for capture/playback arbitration
//!
//! Provides an explicit state machine with three states:
//! - Idle: neither capturing nor playing back
//! - Listening: capture device running
//! - Speaking: synthesized playback active, capture held off

mod machine;

pub use machine::{ArbiterMachine, ArbiterState, State};
