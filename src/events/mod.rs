//! Events module for arbiter transitions
//!
//! Provides the typed inputs the arbiter reacts to, the side-effect
//! commands it produces, and the error payload a capture device reports.

use serde::{Deserialize, Serialize};

/// Inputs to the arbiter, from the owner, the playback notifier, or the
/// capture device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArbiterEvent {
    /// Owner asked to start capture
    UserStart,

    /// Owner asked to stop capture
    UserStop,

    /// Owner asked for a stop immediately followed by a start
    UserRestart,

    /// Synthesized speech began playing
    PlaybackStarted,

    /// Synthesized speech finished playing
    PlaybackEnded,

    /// Capture device produced a final transcript
    CaptureResult { transcript: String },

    /// Capture device reported a failure
    CaptureError { error: CaptureError },

    /// Capture device stopped on its own or after being told to
    CaptureEnded,
}

impl std::fmt::Display for ArbiterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArbiterEvent::UserStart => write!(f, "USER_START"),
            ArbiterEvent::UserStop => write!(f, "USER_STOP"),
            ArbiterEvent::UserRestart => write!(f, "USER_RESTART"),
            ArbiterEvent::PlaybackStarted => write!(f, "PLAYBACK_STARTED"),
            ArbiterEvent::PlaybackEnded => write!(f, "PLAYBACK_ENDED"),
            ArbiterEvent::CaptureResult { transcript } => {
                write!(f, "CAPTURE_RESULT ({} chars)", transcript.chars().count())
            }
            ArbiterEvent::CaptureError { error } => write!(f, "CAPTURE_ERROR ({})", error),
            ArbiterEvent::CaptureEnded => write!(f, "CAPTURE_ENDED"),
        }
    }
}

/// Side effects produced by a transition, executed by the runtime in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Call `start()` on the capture device
    CallDeviceStart,

    /// Call `stop()` on the capture device
    CallDeviceStop,

    /// Hand a transcript to the owner's result callback
    EmitResult { transcript: String },

    /// Hand a device error to the owner's error callback
    EmitError { error: CaptureError },
}

/// Failure categories a capture device can report
///
/// Codes follow the platform speech-recognition error names; unknown codes
/// are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CaptureErrorKind {
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    BadGrammar,
    LanguageNotSupported,
    Other(String),
}

impl CaptureErrorKind {
    /// The wire code for this kind, e.g. `"not-allowed"`
    pub fn code(&self) -> &str {
        match self {
            CaptureErrorKind::NoSpeech => "no-speech",
            CaptureErrorKind::Aborted => "aborted",
            CaptureErrorKind::AudioCapture => "audio-capture",
            CaptureErrorKind::Network => "network",
            CaptureErrorKind::NotAllowed => "not-allowed",
            CaptureErrorKind::ServiceNotAllowed => "service-not-allowed",
            CaptureErrorKind::BadGrammar => "bad-grammar",
            CaptureErrorKind::LanguageNotSupported => "language-not-supported",
            CaptureErrorKind::Other(code) => code,
        }
    }
}

impl From<&str> for CaptureErrorKind {
    fn from(code: &str) -> Self {
        match code {
            "no-speech" => CaptureErrorKind::NoSpeech,
            "aborted" => CaptureErrorKind::Aborted,
            "audio-capture" => CaptureErrorKind::AudioCapture,
            "network" => CaptureErrorKind::Network,
            "not-allowed" => CaptureErrorKind::NotAllowed,
            "service-not-allowed" => CaptureErrorKind::ServiceNotAllowed,
            "bad-grammar" => CaptureErrorKind::BadGrammar,
            "language-not-supported" => CaptureErrorKind::LanguageNotSupported,
            other => CaptureErrorKind::Other(other.to_string()),
        }
    }
}

impl From<String> for CaptureErrorKind {
    fn from(code: String) -> Self {
        CaptureErrorKind::from(code.as_str())
    }
}

impl From<CaptureErrorKind> for String {
    fn from(kind: CaptureErrorKind) -> Self {
        kind.code().to_string()
    }
}

impl std::fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error payload reported by a capture device and forwarded untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureError {
    /// Error category
    pub kind: CaptureErrorKind,

    /// Optional human-readable detail from the device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CaptureError {
    /// Create an error with no detail message
    pub fn new(kind: impl Into<CaptureErrorKind>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
        }
    }

    /// Attach a detail message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "capture error `{}`", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CaptureError {}
