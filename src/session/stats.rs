use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a recorder session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderStats {
    /// Whether recording is currently active
    pub is_recording: bool,

    /// Outcome of the most recent device acquisition attempt
    pub microphone_access: bool,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created
    pub duration_secs: f64,

    /// Number of segments buffered so far
    pub segment_count: usize,

    /// Total audio bytes buffered across all segments
    pub buffered_bytes: usize,
}
