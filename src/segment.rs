use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::capture::CaptureChunk;
use crate::error::Result;

/// Largest number of bytes a segment may hold. A rollover is triggered
/// as soon as an append would reach this bound.
pub const DEFAULT_SEGMENT_THRESHOLD_BYTES: usize = 20_000_000;

/// A bounded contiguous buffer of captured audio bytes.
///
/// Chunks are merged into one buffer as they arrive; insertion order is
/// capture order. Once finalized the buffer no longer accepts appends.
#[derive(Debug, Clone)]
pub struct Segment {
    data: Vec<u8>,
    sample_rate: u32,
    channels: u16,
    started_at_ms: u64,
    finalized: bool,
}

impl Segment {
    fn seeded(chunk: &CaptureChunk) -> Self {
        Self {
            data: chunk.data.clone(),
            sample_rate: chunk.sample_rate,
            channels: chunk.channels,
            started_at_ms: chunk.timestamp_ms,
            finalized: false,
        }
    }

    fn extend(&mut self, chunk: &CaptureChunk) {
        debug_assert!(!self.finalized);
        self.data.extend_from_slice(&chunk.data);
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Byte size of the buffered audio.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw audio bytes (little-endian 16-bit PCM for the built-in
    /// backend).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Capture timestamp of the first chunk in this segment.
    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// What happened to a chunk handed to `SegmentList::append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The chunk was merged into the open segment (or started the first
    /// one)
    Appended,
    /// The open segment was finalized and the chunk seeded a new one;
    /// the caller should cycle the capture handle
    RolledOver,
}

/// Ordered list of segments with byte-bounded rollover.
#[derive(Debug)]
pub struct SegmentList {
    segments: Vec<Segment>,
    threshold_bytes: usize,
}

impl SegmentList {
    pub fn new(threshold_bytes: usize) -> Self {
        Self {
            segments: Vec::new(),
            threshold_bytes,
        }
    }

    /// Append one captured chunk.
    ///
    /// The chunk that trips the threshold always lands in the next
    /// segment, never in the one being finalized — including when it
    /// arrives while a handle cycle is still in progress.
    pub fn append(&mut self, chunk: &CaptureChunk) -> AppendOutcome {
        match self.segments.last_mut() {
            Some(open) if !open.is_finalized() => {
                if open.len() + chunk.len() < self.threshold_bytes {
                    open.extend(chunk);
                    return AppendOutcome::Appended;
                }

                open.finalize();
                let index = self.segments.len() - 1;
                info!(
                    "segment {} finalized at {} bytes",
                    index,
                    self.segments[index].len()
                );
                self.seed(chunk);
                AppendOutcome::RolledOver
            }
            _ => {
                if self.seed(chunk) {
                    AppendOutcome::RolledOver
                } else {
                    AppendOutcome::Appended
                }
            }
        }
    }

    /// Start a new open segment from `chunk`. Returns true when the
    /// chunk alone reaches the threshold and the segment was finalized
    /// on the spot; the data is kept whole rather than split.
    fn seed(&mut self, chunk: &CaptureChunk) -> bool {
        let mut segment = Segment::seeded(chunk);
        let oversize = segment.len() >= self.threshold_bytes;
        if oversize {
            segment.finalize();
        }
        self.segments.push(segment);
        oversize
    }

    /// Seal the open segment, if any. Called when recording stops or
    /// the capture channel closes.
    pub fn finalize_open(&mut self) {
        if let Some(open) = self.segments.last_mut() {
            if !open.is_finalized() {
                open.finalize();
            }
        }
    }

    /// Drop all buffered segments. Only an explicit reset clears the
    /// list.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments in capture order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total buffered bytes across all segments.
    pub fn total_bytes(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }
}

/// Metadata for one exported segment file
#[derive(Debug, Clone)]
pub struct ExportedSegment {
    /// Segment number (0-indexed)
    pub index: usize,
    /// File path of the exported WAV
    pub path: PathBuf,
    /// Payload size in bytes
    pub bytes: usize,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

/// Writes segments to disk as independently playable WAV files.
pub struct SegmentExporter {
    output_dir: PathBuf,
    session_id: String,
}

impl SegmentExporter {
    pub fn new(session_id: String, output_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&output_dir)?;

        Ok(Self {
            output_dir,
            session_id,
        })
    }

    /// Write every segment as `{session_id}-segment-{index:03}.wav`.
    pub fn export(&self, segments: &[Segment]) -> Result<Vec<ExportedSegment>> {
        let mut exported = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            exported.push(self.export_one(index, segment)?);
        }

        info!(
            "exported {} segments to {:?}",
            exported.len(),
            self.output_dir
        );

        Ok(exported)
    }

    fn export_one(&self, index: usize, segment: &Segment) -> Result<ExportedSegment> {
        let path = self
            .output_dir
            .join(format!("{}-segment-{:03}.wav", self.session_id, index));

        let spec = hound::WavSpec {
            channels: segment.channels(),
            sample_rate: segment.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec)?;
        for pair in segment.data().chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;

        Ok(ExportedSegment {
            index,
            path,
            bytes: segment.len(),
            sample_rate: segment.sample_rate(),
            channels: segment.channels(),
        })
    }
}
