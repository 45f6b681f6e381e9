use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::RecorderConfig;
use super::stats::RecorderStats;
use crate::capture::{CaptureBackend, CaptureChunk};
use crate::error::Result;
use crate::notify::{Notifier, AUDIO_PERMISSION_MESSAGE};
use crate::segment::{AppendOutcome, Segment, SegmentList};

/// Lifecycle phase of a recorder session.
///
/// `Restarting` covers a segment rollover: the device handle is cycled
/// while the session stays active from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AcquiringAccess,
    Recording,
    Restarting,
}

/// Shared state handed to the capture task.
struct CaptureContext {
    backend: Arc<Mutex<Box<dyn CaptureBackend>>>,
    segments: Arc<Mutex<SegmentList>>,
    phase: Arc<Mutex<Phase>>,
    is_recording: Arc<AtomicBool>,
    microphone_access: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    notifier: Arc<dyn Notifier>,
}

/// A recorder session that manages device acquisition, chunk buffering
/// and byte-bounded segment rollover
pub struct RecorderSession {
    /// Session configuration
    config: RecorderConfig,

    /// Capture backend owning the device handle
    backend: Arc<Mutex<Box<dyn CaptureBackend>>>,

    /// Notification surface for permission failures
    notifier: Arc<dyn Notifier>,

    /// When the session was created
    started_at: chrono::DateTime<chrono::Utc>,

    /// Current lifecycle phase
    phase: Arc<Mutex<Phase>>,

    /// Whether recording is active from the caller's perspective
    is_recording: Arc<AtomicBool>,

    /// Outcome of the most recent acquisition attempt
    microphone_access: Arc<AtomicBool>,

    /// Set when a stop was requested; honored even mid-acquisition
    stop_requested: Arc<AtomicBool>,

    /// Wakes the capture task for shutdown
    shutdown: Arc<Notify>,

    /// Buffered segments in capture order
    segments: Arc<Mutex<SegmentList>>,

    /// Handle for the capture task
    capture_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RecorderSession {
    /// Create a new recorder session around a capture backend.
    pub fn new(
        config: RecorderConfig,
        backend: Box<dyn CaptureBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        info!("Creating recorder session: {}", config.session_id);

        let threshold = config.segment_threshold_bytes;

        Self {
            config,
            backend: Arc::new(Mutex::new(backend)),
            notifier,
            started_at: Utc::now(),
            phase: Arc::new(Mutex::new(Phase::Idle)),
            is_recording: Arc::new(AtomicBool::new(false)),
            microphone_access: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            segments: Arc::new(Mutex::new(SegmentList::new(threshold))),
            capture_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Start recording.
    ///
    /// Acquires the capture device, which may prompt the user and
    /// suspend until they respond. On denial the session stays idle, the
    /// failure is reported once through the notifier and the error is
    /// returned to the caller. A stop issued while the acquisition is
    /// still pending is honored as soon as it resolves: the handle is
    /// released and the session never becomes active.
    pub async fn start(&self) -> Result<()> {
        {
            let mut phase = self.phase.lock().await;
            if *phase != Phase::Idle {
                warn!("Recording already started");
                return Ok(());
            }
            self.stop_requested.store(false, Ordering::SeqCst);
            *phase = Phase::AcquiringAccess;
        }

        info!("Starting recorder session: {}", self.config.session_id);

        let chunk_rx = {
            let mut backend = self.backend.lock().await;
            match backend.start().await {
                Ok(rx) => rx,
                Err(e) => {
                    self.microphone_access.store(false, Ordering::SeqCst);
                    *self.phase.lock().await = Phase::Idle;
                    self.notifier.notify(AUDIO_PERMISSION_MESSAGE);
                    error!("Device acquisition failed: {}", e);
                    return Err(e);
                }
            }
        };

        self.microphone_access.store(true, Ordering::SeqCst);

        // The stop-request check and the transition to `Recording` stay
        // under one phase lock so a concurrent stop cannot slip between
        // them.
        {
            let mut phase = self.phase.lock().await;

            // A stop raced the acquisition: release the handle instead
            // of going active.
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("Stop requested during acquisition, releasing device");
                let mut backend = self.backend.lock().await;
                if let Err(e) = backend.stop().await {
                    error!("Failed to release capture device: {}", e);
                }
                *phase = Phase::Idle;
                return Ok(());
            }

            *phase = Phase::Recording;
            self.is_recording.store(true, Ordering::SeqCst);

            let ctx = CaptureContext {
                backend: Arc::clone(&self.backend),
                segments: Arc::clone(&self.segments),
                phase: Arc::clone(&self.phase),
                is_recording: Arc::clone(&self.is_recording),
                microphone_access: Arc::clone(&self.microphone_access),
                stop_requested: Arc::clone(&self.stop_requested),
                shutdown: Arc::clone(&self.shutdown),
                notifier: Arc::clone(&self.notifier),
            };

            let task = tokio::spawn(Self::capture_loop(ctx, chunk_rx));
            *self.capture_task.lock().await = Some(task);
        }

        info!("Recorder session started");
        Ok(())
    }

    /// Stop recording.
    ///
    /// A no-op when already stopped. While an acquisition is pending the
    /// request is recorded and honored once it resolves. Otherwise the
    /// device is released after in-flight chunks drain, and the open
    /// segment is finalized.
    pub async fn stop(&self) -> RecorderStats {
        let was_active = {
            let phase = self.phase.lock().await;
            match *phase {
                Phase::Idle => {
                    warn!("Recording not active");
                    false
                }
                Phase::AcquiringAccess => {
                    info!("Stop requested while acquiring device access");
                    self.stop_requested.store(true, Ordering::SeqCst);
                    false
                }
                Phase::Recording | Phase::Restarting => {
                    self.stop_requested.store(true, Ordering::SeqCst);
                    self.shutdown.notify_one();
                    true
                }
            }
        };

        if was_active {
            {
                let mut handle = self.capture_task.lock().await;
                if let Some(task) = handle.take() {
                    if let Err(e) = task.await {
                        error!("Capture task panicked: {}", e);
                    }
                }
            }
            info!("Recorder session stopped");
        }

        self.stats().await
    }

    /// Clear all buffered segments. Recording state is unaffected.
    pub async fn reset(&self) {
        let mut segments = self.segments.lock().await;
        let cleared = segments.len();
        segments.clear();
        info!("Reset recorder session, dropped {} segments", cleared);
    }

    /// Whether recording is active from the caller's perspective (a
    /// rollover in progress still counts as recording).
    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Outcome of the most recent device acquisition attempt.
    pub fn microphone_access(&self) -> bool {
        self.microphone_access.load(Ordering::SeqCst)
    }

    /// Buffered segments in capture order, each independently playable
    /// once exported.
    pub async fn segments(&self) -> Vec<Segment> {
        let segments = self.segments.lock().await;
        segments.segments().to_vec()
    }

    /// Current session statistics.
    pub async fn stats(&self) -> RecorderStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        let (segment_count, buffered_bytes) = {
            let segments = self.segments.lock().await;
            (segments.len(), segments.total_bytes())
        };

        RecorderStats {
            is_recording: self.is_recording.load(Ordering::SeqCst),
            microphone_access: self.microphone_access.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            segment_count,
            buffered_bytes,
        }
    }

    /// Session identifier.
    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Drive chunk delivery for one active recording.
    ///
    /// Runs until a stop is requested, the capture channel closes, or a
    /// rollover fails to reacquire the device. The open segment is
    /// finalized on every exit path.
    async fn capture_loop(ctx: CaptureContext, mut chunk_rx: mpsc::Receiver<CaptureChunk>) {
        info!("Capture task started");

        loop {
            tokio::select! {
                _ = ctx.shutdown.notified() => {
                    // A permit can outlive the recording that stored it
                    // when a stop races the task's own wind-down; only a
                    // requested stop tears this capture down.
                    if !ctx.stop_requested.load(Ordering::SeqCst) {
                        continue;
                    }

                    // Release the device first, then drain whatever was
                    // already buffered so no delivered chunk is lost.
                    {
                        let mut backend = ctx.backend.lock().await;
                        if let Err(e) = backend.stop().await {
                            error!("Failed to release capture device: {}", e);
                        }
                    }
                    while let Some(chunk) = chunk_rx.recv().await {
                        let mut segments = ctx.segments.lock().await;
                        segments.append(&chunk);
                    }
                    break;
                }
                maybe_chunk = chunk_rx.recv() => {
                    let Some(chunk) = maybe_chunk else {
                        warn!("Capture channel closed by backend");
                        let mut backend = ctx.backend.lock().await;
                        if let Err(e) = backend.stop().await {
                            error!("Failed to release capture device: {}", e);
                        }
                        break;
                    };

                    let outcome = {
                        let mut segments = ctx.segments.lock().await;
                        segments.append(&chunk)
                    };

                    if outcome == AppendOutcome::RolledOver {
                        match Self::rollover(&ctx).await {
                            Ok(Some(rx)) => chunk_rx = rx,
                            // stop arrived while the handle was down
                            Ok(None) => break,
                            Err(e) => {
                                // Same handling as a fresh denial: flag,
                                // notify once, end the recording. The
                                // seeded partial segment is kept.
                                ctx.microphone_access.store(false, Ordering::SeqCst);
                                ctx.notifier.notify(AUDIO_PERMISSION_MESSAGE);
                                error!("Failed to reacquire device after rollover: {}", e);
                                break;
                            }
                        }
                    }
                }
            }
        }

        {
            let mut segments = ctx.segments.lock().await;
            segments.finalize_open();
        }
        ctx.is_recording.store(false, Ordering::SeqCst);
        *ctx.phase.lock().await = Phase::Idle;

        info!("Capture task stopped");
    }

    /// Cycle the device handle after a segment rollover.
    ///
    /// The session stays active from the caller's perspective for the
    /// whole cycle. Returns the new chunk receiver, or `None` when a
    /// stop arrived while the handle was down.
    async fn rollover(ctx: &CaptureContext) -> Result<Option<mpsc::Receiver<CaptureChunk>>> {
        *ctx.phase.lock().await = Phase::Restarting;
        info!("Segment threshold reached, cycling capture handle");

        let mut backend = ctx.backend.lock().await;
        backend.stop().await?;

        if ctx.stop_requested.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let rx = backend.start().await?;
        *ctx.phase.lock().await = Phase::Recording;

        Ok(Some(rx))
    }
}
