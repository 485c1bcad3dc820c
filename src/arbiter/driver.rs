//! Arbiter driver: runs the state machine against a real device
//!
//! The driver is the only owner of the capture device and the only mutator
//! of the flags. Every input arrives on one channel, so reactions run one
//! at a time and to completion.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::capture::CaptureDevice;
use crate::events::{ArbiterEvent, CaptureError, Command};
use crate::state::{ArbiterMachine, ArbiterState};

/// Receives what the capture device produced. Calls must not block.
pub trait ResultSink: Send {
    fn on_result(&mut self, transcript: &str);
    fn on_error(&mut self, error: &CaptureError);
}

/// `ResultSink` built from a pair of closures
pub struct Callbacks<R, E> {
    on_result: R,
    on_error: E,
}

impl<R, E> Callbacks<R, E>
where
    R: FnMut(&str) + Send,
    E: FnMut(&CaptureError) + Send,
{
    pub fn new(on_result: R, on_error: E) -> Self {
        Self {
            on_result,
            on_error,
        }
    }
}

impl<R, E> ResultSink for Callbacks<R, E>
where
    R: FnMut(&str) + Send,
    E: FnMut(&CaptureError) + Send,
{
    fn on_result(&mut self, transcript: &str) {
        (self.on_result)(transcript)
    }

    fn on_error(&mut self, error: &CaptureError) {
        (self.on_error)(error)
    }
}

/// Executes state machine commands against the device and the owner's sink
pub struct Arbiter {
    machine: ArbiterMachine,
    /// `None` when the platform has no capture support
    device: Option<Box<dyn CaptureDevice>>,
    sink: Box<dyn ResultSink>,
    flags_tx: watch::Sender<ArbiterState>,
}

impl Arbiter {
    /// Create a new arbiter in `Idle`
    pub fn new(device: Option<Box<dyn CaptureDevice>>, sink: Box<dyn ResultSink>) -> Self {
        let (flags_tx, _) = watch::channel(ArbiterState::default());
        Self {
            machine: ArbiterMachine::new(device.is_some()),
            device,
            sink,
            flags_tx,
        }
    }

    /// Watch the flags, published after every reaction
    pub fn subscribe_flags(&self) -> watch::Receiver<ArbiterState> {
        self.flags_tx.subscribe()
    }

    /// Current flags
    pub fn flags(&self) -> ArbiterState {
        self.machine.flags()
    }

    /// React to one event: run the transition, then carry out its commands
    pub fn dispatch(&mut self, event: ArbiterEvent) {
        debug!(%event, "dispatching event");

        for command in self.machine.handle(event) {
            self.execute(command);
        }
        self.publish();
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::CallDeviceStart => {
                if let Some(device) = self.device.as_mut() {
                    device.start();
                }
            }
            Command::CallDeviceStop => {
                if let Some(device) = self.device.as_mut() {
                    device.stop();
                }
            }
            Command::EmitResult { transcript } => {
                self.sink.on_result(&transcript);
            }
            Command::EmitError { error } => {
                warn!(%error, "capture device error");
                self.sink.on_error(&error);
            }
        }
    }

    fn publish(&self) {
        let flags = self.machine.flags();
        self.flags_tx.send_if_modified(|current| {
            if *current != flags {
                *current = flags;
                true
            } else {
                false
            }
        });
    }

    /// Stop capture if it is still running
    pub fn teardown(&mut self) {
        if self.machine.is_listening() {
            info!("stopping capture on teardown");
        }
        self.dispatch(ArbiterEvent::UserStop);
    }

    /// Process events until `shutdown_rx` fires or every sender is gone.
    /// Events already queued when shutdown is observed are still handled;
    /// later sends are refused.
    pub async fn run(
        mut self,
        mut event_rx: mpsc::UnboundedReceiver<ArbiterEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> ArbiterState {
        info!(
            capture_available = self.machine.capture_available(),
            "arbiter started in Idle state"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => break,

                event = event_rx.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }

        event_rx.close();
        while let Some(event) = event_rx.recv().await {
            self.dispatch(event);
        }

        self.teardown();
        info!("arbiter stopped");

        self.flags()
    }
}
