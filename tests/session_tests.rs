// Integration tests for the recorder session lifecycle
//
// These tests drive a session against a scripted capture backend and
// verify the start/stop/reset contract, rollover behavior and
// permission failure handling.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use segmented_recorder::{
    CaptureBackend, CaptureChunk, Notifier, RecorderConfig, RecorderError, RecorderSession,
};
use tokio::sync::{mpsc, Notify};

/// Notifier that counts how many times it fired.
#[derive(Default)]
struct CountingNotifier {
    notifications: AtomicUsize,
}

impl CountingNotifier {
    fn count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self, _message_key: &str) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }
}

/// State shared between a scripted backend and the test driving it.
#[derive(Default)]
struct BackendShared {
    sender: Mutex<Option<mpsc::Sender<CaptureChunk>>>,
    capturing: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl BackendShared {
    async fn send(&self, chunk: CaptureChunk) {
        let tx = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .expect("backend not capturing");
        tx.send(chunk).await.unwrap();
    }

    fn has_sender(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

/// Capture backend scripted by the test.
///
/// Chunks are pushed through the shared sender slot; `stop` drops the
/// sender so the session sees the channel close, like a real device
/// releasing its tracks.
struct ScriptedBackend {
    shared: Arc<BackendShared>,
    /// Deny access on the Nth start call (0-indexed)
    deny_on_start: Option<usize>,
    /// Block each start until released, for stop-during-acquisition tests
    gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self {
            shared: Arc::new(BackendShared::default()),
            deny_on_start: None,
            gate: None,
        }
    }

    fn deny_on_start(mut self, attempt: usize) -> Self {
        self.deny_on_start = Some(attempt);
        self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn shared(&self) -> Arc<BackendShared> {
        Arc::clone(&self.shared)
    }
}

#[async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn start(&mut self) -> segmented_recorder::Result<mpsc::Receiver<CaptureChunk>> {
        let attempt = self.shared.starts.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.deny_on_start == Some(attempt) {
            return Err(RecorderError::DeviceAccess("permission denied".to_string()));
        }

        let (tx, rx) = mpsc::channel(16);
        *self.shared.sender.lock().unwrap() = Some(tx);
        self.shared.capturing.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> segmented_recorder::Result<()> {
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
        self.shared.capturing.store(false, Ordering::SeqCst);
        self.shared.sender.lock().unwrap().take();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.shared.capturing()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn chunk(data: Vec<u8>, timestamp_ms: u64) -> CaptureChunk {
    CaptureChunk {
        data,
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
    }
}

fn config_with_threshold(threshold: usize) -> RecorderConfig {
    RecorderConfig {
        segment_threshold_bytes: threshold,
        ..RecorderConfig::default()
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_recording_fills_a_single_segment() {
    let backend = ScriptedBackend::new();
    let shared = backend.shared();
    let session = RecorderSession::new(
        config_with_threshold(20_000_000),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    );

    session.start().await.unwrap();
    assert!(session.is_recording());
    assert!(session.microphone_access());

    for i in 0..5u64 {
        shared.send(chunk(vec![i as u8; 1_000_000], i * 1000)).await;
    }

    // stop drains everything already delivered before releasing
    let stats = session.stop().await;
    assert!(!session.is_recording());
    assert_eq!(stats.segment_count, 1);
    assert_eq!(stats.buffered_bytes, 5_000_000);

    let segments = session.segments().await;
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].len(), 5_000_000);
    assert!(segments[0].is_finalized());
}

#[tokio::test]
async fn test_rollover_cycles_the_device() {
    let backend = ScriptedBackend::new();
    let shared = backend.shared();
    let session = RecorderSession::new(
        config_with_threshold(100),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    );

    session.start().await.unwrap();
    shared.send(chunk(vec![1; 60], 0)).await;
    shared.send(chunk(vec![2; 60], 1000)).await; // 120 >= 100, rolls over

    // the session tears down and reacquires the handle
    {
        let shared = Arc::clone(&shared);
        wait_until("handle cycle", move || {
            shared.starts() == 2 && shared.has_sender()
        })
        .await;
    }
    assert!(
        session.is_recording(),
        "still recording from the caller's perspective"
    );

    // the chunk that tripped the threshold seeded the second segment
    shared.send(chunk(vec![3; 10], 2000)).await;

    let stats = session.stop().await;
    assert_eq!(stats.segment_count, 2);

    let segments = session.segments().await;
    assert_eq!(segments[0].len(), 60);
    assert!(segments[0].is_finalized());
    assert_eq!(segments[1].len(), 70);
    assert!(segments[1].is_finalized());

    // one stop for the rollover, one for the final release
    assert_eq!(shared.stops(), 2);
}

#[tokio::test]
async fn test_access_denial_leaves_session_idle() {
    let backend = ScriptedBackend::new().deny_on_start(0);
    let shared = backend.shared();
    let notifier = Arc::new(CountingNotifier::default());
    let session = RecorderSession::new(
        RecorderConfig::default(),
        Box::new(backend),
        notifier.clone(),
    );

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, RecorderError::DeviceAccess(_)));

    assert!(!session.is_recording());
    assert!(!session.microphone_access());
    assert_eq!(notifier.count(), 1, "exactly one notification");
    assert!(session.segments().await.is_empty());

    // the failure is recoverable: a later explicit start retries
    session.start().await.unwrap();
    assert!(session.is_recording());
    assert!(session.microphone_access());
    assert_eq!(shared.starts(), 2);
    assert_eq!(notifier.count(), 1);

    session.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let backend = ScriptedBackend::new();
    let shared = backend.shared();
    let session = RecorderSession::new(
        RecorderConfig::default(),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    );

    // never started
    let stats = session.stop().await;
    assert!(!stats.is_recording);
    assert_eq!(stats.segment_count, 0);
    assert_eq!(shared.stops(), 0);

    session.start().await.unwrap();
    shared.send(chunk(vec![1; 10], 0)).await;
    session.stop().await;
    assert_eq!(shared.stops(), 1);

    // second stop: no state change, no extra release
    let before = session.stats().await;
    let after = session.stop().await;
    assert_eq!(before.segment_count, after.segment_count);
    assert_eq!(before.buffered_bytes, after.buffered_bytes);
    assert!(!after.is_recording);
    assert_eq!(shared.stops(), 1);
}

#[tokio::test]
async fn test_reset_keeps_recording_active() {
    let backend = ScriptedBackend::new();
    let shared = backend.shared();
    let session = RecorderSession::new(
        RecorderConfig::default(),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    );

    session.start().await.unwrap();
    shared.send(chunk(vec![1; 100], 0)).await;

    // wait for the capture task to buffer the delivery
    for _ in 0..400 {
        if session.stats().await.buffered_bytes > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(session.stats().await.buffered_bytes, 100);

    session.reset().await;
    assert!(session.segments().await.is_empty());
    assert!(session.is_recording(), "reset must not stop the recording");

    // capture continues into a fresh segment
    shared.send(chunk(vec![2; 50], 1000)).await;
    let stats = session.stop().await;
    assert_eq!(stats.segment_count, 1);
    assert_eq!(stats.buffered_bytes, 50);
}

#[tokio::test]
async fn test_reset_while_idle() {
    let backend = ScriptedBackend::new();
    let shared = backend.shared();
    let session = RecorderSession::new(
        RecorderConfig::default(),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    );

    session.start().await.unwrap();
    shared.send(chunk(vec![1; 10], 0)).await;
    session.stop().await;

    session.reset().await;
    assert!(session.segments().await.is_empty());
    assert!(!session.is_recording());
}

#[tokio::test]
async fn test_stop_during_acquisition_releases_device() {
    let gate = Arc::new(Notify::new());
    let backend = ScriptedBackend::new().gated(Arc::clone(&gate));
    let shared = backend.shared();
    let session = Arc::new(RecorderSession::new(
        RecorderConfig::default(),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    ));

    let starter = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start().await })
    };

    // let the start call reach the pending acquisition
    {
        let shared = Arc::clone(&shared);
        wait_until("acquisition in flight", move || shared.starts() == 1).await;
    }

    // stop before access resolves
    session.stop().await;

    // the device now grants access; the handle must be released at once
    gate.notify_one();
    starter.await.unwrap().unwrap();

    assert!(!session.is_recording());
    assert!(session.microphone_access(), "access itself was granted");
    assert_eq!(shared.stops(), 1, "handle released immediately");
    assert!(!shared.capturing());
    assert!(session.segments().await.is_empty());
}

#[tokio::test]
async fn test_failed_rollover_keeps_buffered_audio() {
    let backend = ScriptedBackend::new().deny_on_start(1);
    let shared = backend.shared();
    let notifier = Arc::new(CountingNotifier::default());
    let session = RecorderSession::new(
        config_with_threshold(100),
        Box::new(backend),
        notifier.clone(),
    );

    session.start().await.unwrap();
    shared.send(chunk(vec![1; 60], 0)).await;
    shared.send(chunk(vec![2; 60], 1000)).await; // trips the threshold

    // reacquisition is denied; the session winds down on its own
    wait_until("session wind-down", || !session.is_recording()).await;
    assert!(!session.microphone_access());
    assert_eq!(notifier.count(), 1);

    // both the full segment and the seeded partial survive, finalized
    let segments = session.segments().await;
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].len(), 60);
    assert_eq!(segments[1].len(), 60);
    assert!(segments.iter().all(|s| s.is_finalized()));
}

#[tokio::test]
async fn test_start_while_recording_is_noop() {
    let backend = ScriptedBackend::new();
    let shared = backend.shared();
    let session = RecorderSession::new(
        RecorderConfig::default(),
        Box::new(backend),
        Arc::new(CountingNotifier::default()),
    );

    session.start().await.unwrap();
    assert_eq!(shared.starts(), 1);

    session.start().await.unwrap();
    assert_eq!(shared.starts(), 1, "no second acquisition");
    assert!(session.is_recording());

    session.stop().await;
}
