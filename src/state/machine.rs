//! Core arbiter state machine
//!
//! Pure transition logic: takes an `ArbiterEvent`, updates the two flags,
//! and returns the `Command`s the runtime must carry out. No I/O happens here.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{ArbiterEvent, Command};

/// The three observable states of the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Neither capturing nor playing back
    #[default]
    Idle,
    /// Capture device is running
    Listening,
    /// Synthesized speech is playing; capture is held off
    Speaking,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Listening => write!(f, "Listening"),
            State::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Raw flags owned by the arbiter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbiterState {
    pub listening: bool,
    pub speaking: bool,
}

impl ArbiterState {
    /// Collapse the flags into a `State`; speaking wins over listening
    pub fn state(&self) -> State {
        if self.speaking {
            State::Speaking
        } else if self.listening {
            State::Listening
        } else {
            State::Idle
        }
    }
}

/// The state machine that gates capture against playback
pub struct ArbiterMachine {
    /// Current flags
    flags: ArbiterState,
    /// False when the platform has no capture device; device commands are
    /// never produced in that case
    capture_available: bool,
    /// Time when the current non-Idle state was entered
    state_entered_at: Option<Instant>,
}

impl ArbiterMachine {
    /// Create a new machine in `Idle`
    pub fn new(capture_available: bool) -> Self {
        Self {
            flags: ArbiterState::default(),
            capture_available,
            state_entered_at: None,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.flags.state()
    }

    /// Get a copy of the raw flags
    pub fn flags(&self) -> ArbiterState {
        self.flags
    }

    /// Whether the capture device is running
    pub fn is_listening(&self) -> bool {
        self.flags.listening
    }

    /// Whether synthesized playback is active
    pub fn is_speaking(&self) -> bool {
        self.flags.speaking
    }

    /// Whether the machine was built with a capture device
    pub fn capture_available(&self) -> bool {
        self.capture_available
    }

    /// Apply one event and return the commands it produced, in execution order
    pub fn handle(&mut self, event: ArbiterEvent) -> Vec<Command> {
        let old_state = self.state();
        let mut commands = Vec::new();

        match event {
            ArbiterEvent::UserStart => self.start(&mut commands),
            ArbiterEvent::UserStop => self.stop(&mut commands),
            ArbiterEvent::UserRestart => {
                self.stop(&mut commands);
                self.start(&mut commands);
            }
            ArbiterEvent::PlaybackStarted => self.playback_started(&mut commands),
            ArbiterEvent::PlaybackEnded => self.playback_ended(&mut commands),
            ArbiterEvent::CaptureResult { transcript } => {
                commands.push(Command::EmitResult { transcript });
            }
            ArbiterEvent::CaptureError { error } => {
                commands.push(Command::EmitError { error });
            }
            ArbiterEvent::CaptureEnded => self.capture_ended(),
        }

        debug_assert!(!(self.flags.listening && self.flags.speaking));

        let new_state = self.state();
        if new_state != old_state {
            self.record_transition(old_state, new_state);
        }
        if !commands.is_empty() {
            debug!(?commands, "transition produced commands");
        }

        commands
    }

    fn start(&mut self, commands: &mut Vec<Command>) {
        if !self.capture_available || self.flags.listening || self.flags.speaking {
            debug!(flags = ?self.flags, "start ignored");
            return;
        }
        commands.push(Command::CallDeviceStart);
        self.flags.listening = true;
    }

    fn stop(&mut self, commands: &mut Vec<Command>) {
        if !self.capture_available || !self.flags.listening {
            debug!(flags = ?self.flags, "stop ignored");
            return;
        }
        commands.push(Command::CallDeviceStop);
        self.flags.listening = false;
    }

    fn playback_started(&mut self, commands: &mut Vec<Command>) {
        // Capture must be off before the speaking flag is observable
        if self.capture_available && self.flags.listening {
            commands.push(Command::CallDeviceStop);
            self.flags.listening = false;
            info!("capture stopped for playback");
        }
        self.flags.speaking = true;
    }

    fn playback_ended(&mut self, commands: &mut Vec<Command>) {
        self.flags.speaking = false;
        if self.capture_available && !self.flags.listening {
            commands.push(Command::CallDeviceStart);
            self.flags.listening = true;
            info!("capture resumed after playback");
        }
    }

    fn capture_ended(&mut self) {
        if self.flags.speaking {
            // The playback handler already cleared listening
            debug!("capture end during playback ignored");
            return;
        }
        if self.flags.listening {
            info!("capture ended");
        }
        self.flags.listening = false;
    }

    fn record_transition(&mut self, old_state: State, new_state: State) {
        let duration_ms = self
            .state_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "state transition"
        );

        self.state_entered_at = if new_state != State::Idle {
            Some(Instant::now())
        } else {
            None
        };
    }
}

impl Default for ArbiterMachine {
    fn default() -> Self {
        Self::new(true)
    }
}
