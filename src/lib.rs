pub mod capture;
pub mod config;
pub mod error;
pub mod notify;
pub mod segment;
pub mod session;

pub use capture::{CaptureBackend, CaptureChunk, CaptureConfig, SyntheticBackend};
pub use config::Config;
pub use error::{RecorderError, Result};
pub use notify::{LogNotifier, Notifier, AUDIO_PERMISSION_MESSAGE};
pub use segment::{
    AppendOutcome, ExportedSegment, Segment, SegmentExporter, SegmentList,
    DEFAULT_SEGMENT_THRESHOLD_BYTES,
};
pub use session::{RecorderConfig, RecorderSession, RecorderStats};
