//! In-process capture device
//!
//! Stands in for a platform recognizer: text "heard" through a `LoopbackMic`
//! is reported as a transcript only while the device is started. Used by the
//! simulator binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};

use super::{CaptureCapability, CaptureConfig, CaptureDevice, CaptureSink};
use crate::events::CaptureError;

/// State shared between the device and its microphone
#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    continuous: AtomicBool,
    sink: OnceLock<CaptureSink>,
}

/// Capability that always reports capture support
#[derive(Debug, Clone)]
pub struct LoopbackCapture {
    shared: Arc<Shared>,
}

/// Input side of the loopback device
#[derive(Debug, Clone)]
pub struct LoopbackMic {
    shared: Arc<Shared>,
}

struct LoopbackDevice {
    shared: Arc<Shared>,
}

impl LoopbackCapture {
    /// Create the capability and the microphone that feeds it
    pub fn new() -> (Self, LoopbackMic) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LoopbackMic { shared },
        )
    }
}

impl CaptureCapability for LoopbackCapture {
    fn open(&self, config: &CaptureConfig, sink: CaptureSink) -> Option<Box<dyn CaptureDevice>> {
        if self.shared.sink.set(sink).is_err() {
            warn!("loopback device already opened");
            return None;
        }
        self.shared
            .continuous
            .store(config.continuous, Ordering::SeqCst);

        info!(
            language = %config.language,
            continuous = config.continuous,
            interim_results = config.interim_results,
            "loopback capture device opened"
        );

        Some(Box::new(LoopbackDevice {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl CaptureDevice for LoopbackDevice {
    fn start(&mut self) {
        self.shared.active.store(true, Ordering::SeqCst);
        debug!("loopback capture started");
    }

    // A commanded stop does not report `ended`; only natural ends do
    fn stop(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        debug!("loopback capture stopped");
    }
}

impl LoopbackMic {
    /// Whether the device is currently capturing
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Deliver an utterance. Returns false if the device was not capturing
    /// and the utterance was lost.
    pub fn hear(&self, text: &str) -> bool {
        let Some(sink) = self.sink() else {
            return false;
        };
        if !self.is_active() {
            debug!(text, "not capturing, utterance dropped");
            return false;
        }

        sink.result(text);

        if !self.shared.continuous.load(Ordering::SeqCst) {
            self.shared.active.store(false, Ordering::SeqCst);
            sink.ended();
        }
        true
    }

    /// Report a device failure, regardless of capture state
    pub fn fail(&self, error: CaptureError) {
        if let Some(sink) = self.sink() {
            sink.error(error);
        }
    }

    /// End capture on the device's own accord
    pub fn fall_silent(&self) {
        let Some(sink) = self.sink() else {
            return;
        };
        if self.shared.active.swap(false, Ordering::SeqCst) {
            sink.ended();
        }
    }

    fn sink(&self) -> Option<&CaptureSink> {
        let sink = self.shared.sink.get();
        if sink.is_none() {
            debug!("loopback device not opened yet");
        }
        sink
    }
}
