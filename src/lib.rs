//! voice-arbiter: keeps speech capture and synthesized playback apart
//!
//! A voice interface must never transcribe its own synthesized speech. The
//! arbiter owns the capture device, stops it whenever playback starts, and
//! resumes it when playback ends.
//!
//! - `state`: pure state machine (Idle, Listening, Speaking)
//! - `arbiter`: runtime that executes the machine's commands
//! - `capture` / `playback`: the device and notifier seams

pub mod arbiter;
pub mod capture;
pub mod error;
pub mod events;
pub mod playback;
pub mod state;

pub use arbiter::{mount, ArbiterHandle, Callbacks, MountedArbiter, ResultSink};
pub use error::{ArbiterError, ArbiterResult};
pub use events::{ArbiterEvent, CaptureError, CaptureErrorKind, Command};
pub use state::{ArbiterMachine, ArbiterState, State};
