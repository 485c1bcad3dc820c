//! Mounting an arbiter for an owner, and the handle the owner drives it with

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{CaptureCapability, CaptureConfig, CaptureSink};
use crate::error::{ArbiterError, ArbiterResult};
use crate::events::ArbiterEvent;
use crate::playback::{PlaybackListener, PlaybackNotifier, PlaybackSubscription};
use crate::state::ArbiterState;

use super::driver::{Arbiter, ResultSink};

/// Owner-side handle: start/stop/restart and the published flags
#[derive(Debug, Clone)]
pub struct ArbiterHandle {
    tx: mpsc::UnboundedSender<ArbiterEvent>,
    flags: watch::Receiver<ArbiterState>,
}

impl ArbiterHandle {
    /// Start capture unless already listening or playback is active
    pub fn start(&self) -> ArbiterResult<()> {
        self.send(ArbiterEvent::UserStart)
    }

    /// Stop capture if listening
    pub fn stop(&self) -> ArbiterResult<()> {
        self.send(ArbiterEvent::UserStop)
    }

    /// Stop then start, as one reaction
    pub fn restart(&self) -> ArbiterResult<()> {
        self.send(ArbiterEvent::UserRestart)
    }

    /// Last published value of the listening flag
    pub fn is_listening(&self) -> bool {
        self.flags.borrow().listening
    }

    /// Last published flags
    pub fn flags(&self) -> ArbiterState {
        *self.flags.borrow()
    }

    /// Wait until the listening flag equals `value`
    pub async fn wait_for_listening(&mut self, value: bool) -> ArbiterResult<()> {
        self.wait_until(|flags| flags.listening == value).await
    }

    /// Wait until the speaking flag equals `value`
    pub async fn wait_for_speaking(&mut self, value: bool) -> ArbiterResult<()> {
        self.wait_until(|flags| flags.speaking == value).await
    }

    async fn wait_until(&mut self, check: impl FnMut(&ArbiterState) -> bool) -> ArbiterResult<()> {
        self.flags
            .wait_for(check)
            .await
            .map(|_| ())
            .map_err(|_| ArbiterError::Closed)
    }

    fn send(&self, event: ArbiterEvent) -> ArbiterResult<()> {
        self.tx.send(event).map_err(|_| ArbiterError::Closed)
    }
}

/// A running arbiter bound to its owner's lifetime
pub struct MountedArbiter {
    handle: ArbiterHandle,
    subscription: PlaybackSubscription,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<ArbiterState>,
}

/// Open the capture device (if the platform has one), attach to the playback
/// notifier, and spawn the arbiter task. Must be called inside a tokio runtime.
pub fn mount<S>(
    config: &CaptureConfig,
    capability: &dyn CaptureCapability,
    notifier: Arc<dyn PlaybackNotifier>,
    sink: S,
) -> MountedArbiter
where
    S: ResultSink + 'static,
{
    let (tx, event_rx) = mpsc::unbounded_channel();

    let device = capability.open(config, CaptureSink::new(tx.clone()));
    if device.is_none() {
        if capability.is_supported() {
            warn!("capture device could not be opened, running without capture");
        } else {
            info!("speech capture unsupported, running without capture");
        }
    }

    let arbiter = Arbiter::new(device, Box::new(sink));
    let flags = arbiter.subscribe_flags();

    // Bound once; the task holds the state these listeners act on
    let subscription = PlaybackSubscription::attach(
        notifier,
        playback_listener(tx.clone(), ArbiterEvent::PlaybackStarted),
        playback_listener(tx.clone(), ArbiterEvent::PlaybackEnded),
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(arbiter.run(event_rx, shutdown_rx));

    info!(language = %config.language, "arbiter mounted");

    MountedArbiter {
        handle: ArbiterHandle { tx, flags },
        subscription,
        shutdown_tx,
        task,
    }
}

fn playback_listener(tx: mpsc::UnboundedSender<ArbiterEvent>, event: ArbiterEvent) -> PlaybackListener {
    Arc::new(move || {
        if tx.send(event.clone()).is_err() {
            debug!(%event, "playback event after arbiter stopped");
        }
    })
}

impl MountedArbiter {
    /// A new handle for driving the arbiter
    pub fn handle(&self) -> ArbiterHandle {
        self.handle.clone()
    }

    /// Last published value of the listening flag
    pub fn is_listening(&self) -> bool {
        self.handle.is_listening()
    }

    /// Detach from the notifier, let the task finish what is queued, and
    /// return the final flags
    pub async fn unmount(self) -> ArbiterResult<ArbiterState> {
        let MountedArbiter {
            handle: _,
            mut subscription,
            shutdown_tx,
            task,
        } = self;

        subscription.cancel();
        // The task may already be gone; its result is still in the join handle
        let _ = shutdown_tx.send(());

        let flags = task.await?;
        info!(?flags, "arbiter unmounted");
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::testing::{DeviceCall, FakeCapability, NotifierCall, Recorded, RecordingNotifier};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::capture::{LoopbackCapture, Unsupported};
    use crate::events::CaptureError;
    use crate::playback::PlaybackEventKind;

    fn mount_fake() -> (MountedArbiter, Arc<FakeCapability>, Arc<RecordingNotifier>, Recorded) {
        let capability = Arc::new(FakeCapability::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let recorded = Recorded::default();
        let mounted = mount(
            &CaptureConfig::default(),
            capability.as_ref(),
            notifier.clone(),
            recorded.clone(),
        );
        (mounted, capability, notifier, recorded)
    }

    #[tokio::test]
    async fn test_mount_opens_device_with_config() {
        let (mounted, capability, _, _) = mount_fake();

        let config = capability.config.lock().unwrap().clone().unwrap();
        assert_eq!(config.language, "ko-KR");
        assert!(config.continuous);
        assert!(!config.interim_results);

        mounted.unmount().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (mounted, capability, _, _) = mount_fake();
        let mut handle = mounted.handle();

        handle.start().unwrap();
        handle.start().unwrap();
        handle.wait_for_listening(true).await.unwrap();
        assert!(mounted.is_listening());

        let flags = mounted.unmount().await.unwrap();

        // One start; the stop comes from teardown
        assert_eq!(
            capability.log.calls(),
            vec![DeviceCall::Start, DeviceCall::Stop]
        );
        assert_eq!(flags, ArbiterState::default());
    }

    #[tokio::test]
    async fn test_playback_gates_capture() {
        let (mounted, capability, notifier, _) = mount_fake();
        let mut handle = mounted.handle();

        handle.start().unwrap();
        handle.wait_for_listening(true).await.unwrap();

        assert_eq!(notifier.fire(PlaybackEventKind::Start), 1);
        handle.wait_for_listening(false).await.unwrap();

        // Spurious device end while speaking
        capability.sink().ended();

        assert_eq!(notifier.fire(PlaybackEventKind::End), 1);
        handle.wait_for_listening(true).await.unwrap();

        assert_eq!(
            capability.log.calls(),
            vec![DeviceCall::Start, DeviceCall::Stop, DeviceCall::Start]
        );

        mounted.unmount().await.unwrap();
    }

    #[tokio::test]
    async fn test_results_and_errors_reach_owner() {
        let (mounted, capability, _, recorded) = mount_fake();
        let handle = mounted.handle();
        handle.start().unwrap();

        let sink = capability.sink();
        sink.result("안녕하세요");
        sink.error(CaptureError::new("not-allowed"));

        let flags = mounted.unmount().await.unwrap();

        assert_eq!(recorded.results(), vec!["안녕하세요".to_string()]);
        assert_eq!(recorded.errors(), vec![CaptureError::new("not-allowed")]);
        // No retry after the error: one start, then the teardown stop
        assert_eq!(
            capability.log.calls(),
            vec![DeviceCall::Start, DeviceCall::Stop]
        );
        assert!(!flags.listening);
    }

    #[tokio::test]
    async fn test_restart_while_listening() {
        let (mounted, capability, _, _) = mount_fake();
        let mut handle = mounted.handle();

        handle.start().unwrap();
        handle.wait_for_listening(true).await.unwrap();
        handle.restart().unwrap();

        mounted.unmount().await.unwrap();

        assert_eq!(
            capability.log.calls(),
            vec![
                DeviceCall::Start,
                DeviceCall::Stop,
                DeviceCall::Start,
                DeviceCall::Stop,
            ]
        );
    }

    #[tokio::test]
    async fn test_unmount_detaches_listeners() {
        let (mounted, _, notifier, _) = mount_fake();
        let handle = mounted.handle();

        assert_eq!(notifier.listener_count(PlaybackEventKind::Start), 1);
        assert_eq!(notifier.listener_count(PlaybackEventKind::End), 1);

        mounted.unmount().await.unwrap();

        let calls = notifier.calls();
        assert_eq!(calls.len(), 4);
        let (start_id, end_id) = match (calls[0], calls[1]) {
            (
                NotifierCall::Add(PlaybackEventKind::Start, start),
                NotifierCall::Add(PlaybackEventKind::End, end),
            ) => (start, end),
            other => panic!("unexpected registration: {:?}", other),
        };
        assert_eq!(calls[2], NotifierCall::Remove(PlaybackEventKind::Start, start_id));
        assert_eq!(calls[3], NotifierCall::Remove(PlaybackEventKind::End, end_id));

        assert_eq!(notifier.fire(PlaybackEventKind::Start), 0);
        assert_eq!(notifier.fire(PlaybackEventKind::End), 0);

        assert!(matches!(handle.start(), Err(ArbiterError::Closed)));
    }

    #[tokio::test]
    async fn test_unsupported_capture_degrades_silently() {
        let notifier = Arc::new(RecordingNotifier::default());
        let recorded = Recorded::default();
        let mounted = mount(
            &CaptureConfig::default(),
            &Unsupported,
            notifier.clone(),
            recorded.clone(),
        );
        let handle = mounted.handle();

        // Listeners are wired even without a device
        assert_eq!(notifier.listener_count(PlaybackEventKind::Start), 1);

        handle.start().unwrap();
        handle.restart().unwrap();
        notifier.fire(PlaybackEventKind::Start);
        notifier.fire(PlaybackEventKind::End);
        handle.stop().unwrap();

        let flags = mounted.unmount().await.unwrap();

        assert_eq!(flags, ArbiterState::default());
        assert!(!handle.is_listening());
        assert!(recorded.errors().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unmount_finishes_under_constant_input() {
        let (mounted, capability, _, recorded) = mount_fake();
        let sink = capability.sink();
        let running = Arc::new(AtomicBool::new(true));

        let producer = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    sink.result("x");
                    std::thread::sleep(Duration::from_micros(50));
                }
            })
        };

        while recorded.results().is_empty() {
            tokio::task::yield_now().await;
        }

        let unmounted = tokio::time::timeout(Duration::from_secs(2), mounted.unmount()).await;
        running.store(false, Ordering::SeqCst);
        producer.join().unwrap();

        let flags = unmounted
            .expect("unmount should finish while input keeps arriving")
            .unwrap();
        assert_eq!(flags, ArbiterState::default());
    }

    #[tokio::test]
    async fn test_refused_open_runs_without_capture() {
        let (loopback, _mic) = LoopbackCapture::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(loopback
            .open(&CaptureConfig::default(), CaptureSink::new(tx))
            .is_some());
        assert!(loopback.is_supported());

        let notifier = Arc::new(RecordingNotifier::default());
        let mounted = mount(
            &CaptureConfig::default(),
            &loopback,
            notifier,
            Recorded::default(),
        );
        let handle = mounted.handle();
        handle.start().unwrap();

        let flags = mounted.unmount().await.unwrap();
        assert_eq!(flags, ArbiterState::default());
    }
}
