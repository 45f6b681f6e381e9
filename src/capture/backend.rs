use tokio::sync::mpsc;

use crate::error::Result;

/// One delivery of captured audio bytes.
///
/// The payload is encoded audio (raw little-endian 16-bit PCM for the
/// built-in backend). Segmentation operates on byte sizes, so the
/// controller never decodes the payload.
#[derive(Debug, Clone)]
pub struct CaptureChunk {
    /// Encoded audio bytes for this delivery window
    pub data: Vec<u8>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl CaptureChunk {
    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Delivery interval: one chunk is emitted per interval while capturing
    pub chunk_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_interval_ms: 1000, // one delivery per second
        }
    }
}

/// Audio capture backend trait
///
/// The backend owns the platform device handle. `start` performs the
/// access request (which may prompt the user) and begins periodic chunk
/// delivery; `stop` releases the device and stops all hardware tracks.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request device access and begin capturing.
    ///
    /// Returns a channel receiver that will receive one chunk per
    /// configured interval, in capture order. Fails with
    /// `RecorderError::DeviceAccess` when permission is denied or no
    /// input device exists.
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureChunk>>;

    /// Stop capturing and release the device, stopping all hardware
    /// tracks. The delivery channel closes once in-flight chunks drain.
    /// Idempotent.
    async fn stop(&mut self) -> Result<()>;

    /// Check if the backend currently holds an open device handle
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
