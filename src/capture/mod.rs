//! Capture module: the speech-to-text device seam
//!
//! The platform supplies a `CaptureCapability`; the arbiter asks it once for
//! a device and is from then on the only caller of `start`/`stop`. The device
//! reports back through the `CaptureSink` it was opened with.

mod loopback;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::events::{ArbiterEvent, CaptureError};

pub use loopback::{LoopbackCapture, LoopbackMic};

/// Language tag capture is configured with unless overridden
pub const DEFAULT_LANGUAGE: &str = "ko-KR";

/// Fixed settings a device is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// BCP 47 language tag, e.g. `ko-KR`
    pub language: String,

    /// Keep capturing across utterances instead of stopping after one
    pub continuous: bool,

    /// Emit partial transcripts; the arbiter only expects final ones
    pub interim_results: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            continuous: true,
            interim_results: false,
        }
    }
}

/// A speech-to-text device. Commands are fire-and-forget; outcomes arrive
/// through the device's `CaptureSink`.
pub trait CaptureDevice: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Platform capability detection
pub trait CaptureCapability {
    /// Open a device, or `None` when the platform cannot capture speech
    /// or refuses to hand out another device
    fn open(&self, config: &CaptureConfig, sink: CaptureSink) -> Option<Box<dyn CaptureDevice>>;

    /// Whether the platform has speech capture at all
    fn is_supported(&self) -> bool {
        true
    }
}

/// Capability for platforms with no speech capture at all
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl CaptureCapability for Unsupported {
    fn open(&self, _config: &CaptureConfig, _sink: CaptureSink) -> Option<Box<dyn CaptureDevice>> {
        None
    }

    fn is_supported(&self) -> bool {
        false
    }
}

/// Device-side handle for reporting results, errors, and end of capture
#[derive(Debug, Clone)]
pub struct CaptureSink {
    tx: mpsc::UnboundedSender<ArbiterEvent>,
}

impl CaptureSink {
    pub fn new(tx: mpsc::UnboundedSender<ArbiterEvent>) -> Self {
        Self { tx }
    }

    /// Report a final transcript
    pub fn result(&self, transcript: impl Into<String>) {
        self.send(ArbiterEvent::CaptureResult {
            transcript: transcript.into(),
        });
    }

    /// Report a device failure
    pub fn error(&self, error: CaptureError) {
        self.send(ArbiterEvent::CaptureError { error });
    }

    /// Report that capture has ended
    pub fn ended(&self) {
        self.send(ArbiterEvent::CaptureEnded);
    }

    fn send(&self, event: ArbiterEvent) {
        if self.tx.send(event).is_err() {
            warn!("capture event dropped - arbiter gone");
        }
    }
}
