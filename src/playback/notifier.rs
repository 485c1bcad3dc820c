//! In-process playback notifier and listener subscriptions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::{ListenerId, PlaybackEventKind, PlaybackListener, PlaybackNotifier};

/// Notifier that speech synthesis calls into when output starts and ends
#[derive(Default)]
pub struct SynthesisNotifier {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, PlaybackEventKind, PlaybackListener)>>,
}

impl SynthesisNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every listener registered for `kind`. Returns how many ran.
    pub fn notify(&self, kind: PlaybackEventKind) -> usize {
        // Listeners may add or remove listeners, so call them unlocked
        let targets: Vec<PlaybackListener> = self
            .lock()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        debug!(%kind, listeners = targets.len(), "playback notification");

        for listener in &targets {
            listener();
        }
        targets.len()
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count(&self, kind: PlaybackEventKind) -> usize {
        self.lock().iter().filter(|(_, k, _)| *k == kind).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, PlaybackEventKind, PlaybackListener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlaybackNotifier for SynthesisNotifier {
    fn add_listener(&self, kind: PlaybackEventKind, listener: PlaybackListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, kind, listener));
        id
    }

    fn remove_listener(&self, kind: PlaybackEventKind, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(i, k, _)| !(*i == id && *k == kind));
        listeners.len() != before
    }
}

/// A `Start` and an `End` listener registered together. Both are removed
/// on `cancel` or drop.
pub struct PlaybackSubscription {
    notifier: Arc<dyn PlaybackNotifier>,
    ids: Option<(ListenerId, ListenerId)>,
}

impl PlaybackSubscription {
    /// Register `on_start` and `on_end` with `notifier`
    pub fn attach(
        notifier: Arc<dyn PlaybackNotifier>,
        on_start: PlaybackListener,
        on_end: PlaybackListener,
    ) -> Self {
        let start = notifier.add_listener(PlaybackEventKind::Start, on_start);
        let end = notifier.add_listener(PlaybackEventKind::End, on_end);
        debug!(?start, ?end, "playback listeners attached");

        Self {
            notifier,
            ids: Some((start, end)),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.ids.is_some()
    }

    /// Remove both listeners. Calling again is a no-op.
    pub fn cancel(&mut self) {
        let Some((start, end)) = self.ids.take() else {
            return;
        };

        if !self.notifier.remove_listener(PlaybackEventKind::Start, start) {
            warn!(?start, "start listener was already gone");
        }
        if !self.notifier.remove_listener(PlaybackEventKind::End, end) {
            warn!(?end, "end listener was already gone");
        }
        debug!("playback listeners detached");
    }
}

impl Drop for PlaybackSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
