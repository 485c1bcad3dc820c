//! Test doubles for the capture device, the owner's sink, and the notifier

use std::sync::{Arc, Mutex};

use crate::capture::{CaptureCapability, CaptureConfig, CaptureDevice, CaptureSink};
use crate::events::CaptureError;
use crate::playback::{
    ListenerId, PlaybackEventKind, PlaybackListener, PlaybackNotifier, SynthesisNotifier,
};

use super::ResultSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    Start,
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DeviceCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, call: DeviceCall) {
        self.0.lock().unwrap().push(call);
    }
}

pub struct FakeDevice {
    log: CallLog,
}

impl FakeDevice {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl CaptureDevice for FakeDevice {
    fn start(&mut self) {
        self.log.push(DeviceCall::Start);
    }

    fn stop(&mut self) {
        self.log.push(DeviceCall::Stop);
    }
}

/// Capability that hands out a `FakeDevice` and keeps the sink it was given
#[derive(Default)]
pub struct FakeCapability {
    pub log: CallLog,
    pub config: Mutex<Option<CaptureConfig>>,
    sink: Mutex<Option<CaptureSink>>,
}

impl FakeCapability {
    /// The sink the device was opened with; panics before `open`
    pub fn sink(&self) -> CaptureSink {
        self.sink.lock().unwrap().clone().expect("device not opened")
    }
}

impl CaptureCapability for FakeCapability {
    fn open(&self, config: &CaptureConfig, sink: CaptureSink) -> Option<Box<dyn CaptureDevice>> {
        *self.config.lock().unwrap() = Some(config.clone());
        *self.sink.lock().unwrap() = Some(sink);
        Some(Box::new(FakeDevice::new(self.log.clone())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorded {
    results: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<CaptureError>>>,
}

impl Recorded {
    pub fn results(&self) -> Vec<String> {
        self.results.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<CaptureError> {
        self.errors.lock().unwrap().clone()
    }
}

impl ResultSink for Recorded {
    fn on_result(&mut self, transcript: &str) {
        self.results.lock().unwrap().push(transcript.to_string());
    }

    fn on_error(&mut self, error: &CaptureError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierCall {
    Add(PlaybackEventKind, ListenerId),
    Remove(PlaybackEventKind, ListenerId),
}

/// Notifier that records every add/remove call
#[derive(Default)]
pub struct RecordingNotifier {
    inner: SynthesisNotifier,
    log: Mutex<Vec<NotifierCall>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.log.lock().unwrap().clone()
    }

    pub fn fire(&self, kind: PlaybackEventKind) -> usize {
        self.inner.notify(kind)
    }

    pub fn listener_count(&self, kind: PlaybackEventKind) -> usize {
        self.inner.listener_count(kind)
    }
}

impl PlaybackNotifier for RecordingNotifier {
    fn add_listener(&self, kind: PlaybackEventKind, listener: PlaybackListener) -> ListenerId {
        let id = self.inner.add_listener(kind, listener);
        self.log.lock().unwrap().push(NotifierCall::Add(kind, id));
        id
    }

    fn remove_listener(&self, kind: PlaybackEventKind, id: ListenerId) -> bool {
        self.log.lock().unwrap().push(NotifierCall::Remove(kind, id));
        self.inner.remove_listener(kind, id)
    }
}
