//! Playback module: lifecycle notifications for synthesized speech
//!
//! Synthesis code announces `Start`/`End` through a `PlaybackNotifier`. The
//! notifier is injected into the arbiter rather than reached as a global.

mod notifier;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use notifier::{PlaybackSubscription, SynthesisNotifier};

/// Lifecycle events a notifier announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEventKind {
    /// Speech output began
    Start,
    /// Speech output finished
    End,
}

impl std::fmt::Display for PlaybackEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackEventKind::Start => write!(f, "start"),
            PlaybackEventKind::End => write!(f, "end"),
        }
    }
}

/// Identifies one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Listener callback; must return quickly and never block
pub type PlaybackListener = Arc<dyn Fn() + Send + Sync>;

/// Announces synthesized speech lifecycle events to registered listeners
pub trait PlaybackNotifier: Send + Sync {
    /// Register `listener` for `kind` events
    fn add_listener(&self, kind: PlaybackEventKind, listener: PlaybackListener) -> ListenerId;

    /// Unregister a listener. Returns false if it was not registered.
    fn remove_listener(&self, kind: PlaybackEventKind, id: ListenerId) -> bool;
}
