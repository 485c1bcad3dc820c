//! voice-arbiter: interactive simulator for the capture/playback arbiter
//!
//! Mounts an arbiter over an in-process capture device and playback
//! notifier, then drives it from stdin:
//! - `start` / `stop` / `restart`: owner operations
//! - `say <text>`: play synthesized speech (its echo reaches the mic)
//! - `hear <text>`: the user speaks
//! - `fail <code>`: the device reports an error
//! - `silence`: the device ends capture on its own

mod config;
mod lifecycle;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voice_arbiter::capture::{CaptureCapability, LoopbackCapture, LoopbackMic, Unsupported};
use voice_arbiter::playback::{PlaybackEventKind, SynthesisNotifier};
use voice_arbiter::{mount, ArbiterHandle, Callbacks, CaptureError};

use crate::config::Config;
use crate::lifecycle::ShutdownSignal;

/// Simulated playback time per character of synthesized text
const SPEECH_MS_PER_CHAR: u64 = 60;

/// One line of simulator input
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Start,
    Stop,
    Restart,
    Say(String),
    Hear(String),
    Fail(String),
    Silence,
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let needs_arg = |make: fn(String) -> Input| {
        if rest.is_empty() {
            Err(format!("`{}` needs an argument", word))
        } else {
            Ok(Some(make(rest.to_string())))
        }
    };

    match word {
        "start" => Ok(Some(Input::Start)),
        "stop" => Ok(Some(Input::Stop)),
        "restart" => Ok(Some(Input::Restart)),
        "say" => needs_arg(Input::Say),
        "hear" => needs_arg(Input::Hear),
        "fail" => needs_arg(Input::Fail),
        "silence" => Ok(Some(Input::Silence)),
        "status" => Ok(Some(Input::Status)),
        "help" | "?" => Ok(Some(Input::Help)),
        "quit" | "exit" => Ok(Some(Input::Quit)),
        other => Err(format!("unknown command `{}`", other)),
    }
}

fn print_help() {
    println!("commands: start | stop | restart | say <text> | hear <text> | fail <code> | silence | status | quit");
}

struct Simulator {
    handle: ArbiterHandle,
    notifier: Arc<SynthesisNotifier>,
    mic: LoopbackMic,
}

impl Simulator {
    /// Apply one input. Returns false when the simulator should exit.
    async fn apply(&mut self, input: Input) -> Result<bool> {
        match input {
            Input::Start => self.handle.start()?,
            Input::Stop => self.handle.stop()?,
            Input::Restart => self.handle.restart()?,
            Input::Say(text) => self.say(text).await?,
            Input::Hear(text) => {
                if !self.mic.hear(&text) {
                    println!("(not listening, nothing captured)");
                }
            }
            Input::Fail(code) => self.mic.fail(CaptureError::new(code)),
            Input::Silence => self.mic.fall_silent(),
            Input::Status => println!(
                "listening={} mic_active={}",
                self.handle.is_listening(),
                self.mic.is_active()
            ),
            Input::Help => print_help(),
            Input::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn say(&mut self, text: String) -> Result<()> {
        self.notifier.notify(PlaybackEventKind::Start);
        // Everything queued before playback started has been handled once
        // speaking is published, so capture is off
        self.handle.wait_for_speaking(true).await?;

        // The speaker's own output reaches the microphone
        if self.mic.hear(&text) {
            warn!("synthesized speech was captured");
        }

        let duration = Duration::from_millis(SPEECH_MS_PER_CHAR * text.chars().count() as u64);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            notifier.notify(PlaybackEventKind::End);
        });

        info!(duration_ms = duration.as_millis() as u64, "speaking");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voice-arbiter starting"
    );

    let config = Config::load().context("failed to load configuration")?;
    info!(
        language = %config.capture.language,
        capture_enabled = config.capture_enabled,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();
    let notifier = Arc::new(SynthesisNotifier::new());
    let (loopback, mic) = LoopbackCapture::new();

    let capability: &dyn CaptureCapability = if config.capture_enabled {
        &loopback
    } else {
        &Unsupported
    };

    let callbacks = Callbacks::new(
        |transcript: &str| println!("transcript: {}", transcript),
        |error: &CaptureError| println!("capture error: {}", error),
    );

    let mounted = mount(&config.capture, capability, notifier.clone(), callbacks);
    let mut simulator = Simulator {
        handle: mounted.handle(),
        notifier,
        mic,
    };

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown_wait = shutdown.wait();
    tokio::pin!(shutdown_wait);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Ok(Some(input)) => {
                        if !simulator.apply(input).await? {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                }
            }

            result = &mut shutdown_wait => {
                result.context("failed to register signal handlers")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("shutting down...");
    let flags = mounted.unmount().await?;
    info!(?flags, "voice-arbiter stopped");

    Ok(())
}
