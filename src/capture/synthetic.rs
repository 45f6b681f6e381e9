use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::backend::{CaptureBackend, CaptureChunk, CaptureConfig};
use crate::error::Result;

/// Capture backend that synthesizes a sine tone instead of opening a
/// hardware device.
///
/// Used by the demo binary and tests; platform backends implement the
/// same trait against a real input device.
pub struct SyntheticBackend {
    config: CaptureConfig,
    tone_hz: f32,
    capturing: Arc<AtomicBool>,
    generator: Option<JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            tone_hz: 440.0,
            capturing: Arc::new(AtomicBool::new(false)),
            generator: None,
        }
    }

    pub fn with_tone(mut self, tone_hz: f32) -> Self {
        self.tone_hz = tone_hz;
        self
    }

    /// Render one interval worth of little-endian 16-bit PCM.
    fn render_chunk(config: &CaptureConfig, tone_hz: f32, chunk_index: u64) -> Vec<u8> {
        let samples_per_chunk =
            (config.sample_rate as u64 * config.chunk_interval_ms / 1000) as usize;
        let mut data = Vec::with_capacity(samples_per_chunk * config.channels as usize * 2);
        let first_sample = chunk_index * samples_per_chunk as u64;

        for i in 0..samples_per_chunk {
            let t = (first_sample + i as u64) as f32 / config.sample_rate as f32;
            let amplitude = (TAU * tone_hz * t).sin() * 0.3;
            let sample = (amplitude * i16::MAX as f32) as i16;
            for _ in 0..config.channels {
                data.extend_from_slice(&sample.to_le_bytes());
            }
        }

        data
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureChunk>> {
        if self.capturing.load(Ordering::SeqCst) {
            self.stop().await?;
        }

        self.capturing.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);
        let capturing = Arc::clone(&self.capturing);
        let config = self.config.clone();
        let tone_hz = self.tone_hz;

        let generator = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(config.chunk_interval_ms));
            // the first tick completes immediately
            ticker.tick().await;

            let mut chunk_index: u64 = 0;
            while capturing.load(Ordering::SeqCst) {
                ticker.tick().await;
                let chunk = CaptureChunk {
                    data: SyntheticBackend::render_chunk(&config, tone_hz, chunk_index),
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                    timestamp_ms: chunk_index * config.chunk_interval_ms,
                };
                chunk_index += 1;

                if tx.send(chunk).await.is_err() {
                    debug!("chunk receiver dropped, ending synthetic capture");
                    break;
                }
            }
        });

        self.generator = Some(generator);
        info!("synthetic capture started ({} Hz tone)", self.tone_hz);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // the generator exits at its next tick, closing the channel
        if let Some(generator) = self.generator.take() {
            if let Err(e) = generator.await {
                error!("synthetic generator task panicked: {}", e);
            }
        }

        info!("synthetic capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
