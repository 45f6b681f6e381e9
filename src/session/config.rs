use serde::{Deserialize, Serialize};

use crate::segment::DEFAULT_SEGMENT_THRESHOLD_BYTES;

/// Configuration for a recorder session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Unique session identifier (used for exported segment filenames)
    pub session_id: String,

    /// Byte bound per segment; a rollover starts a new segment as soon
    /// as an append would reach this size
    /// Default: 20,000,000 bytes
    pub segment_threshold_bytes: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            session_id: format!("recording-{}", uuid::Uuid::new_v4()),
            segment_threshold_bytes: DEFAULT_SEGMENT_THRESHOLD_BYTES,
        }
    }
}
