use thiserror::Error;

/// All errors produced by the segmented recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("capture device access denied: {0}")]
    DeviceAccess(String),

    #[error("capture device error: {0}")]
    Device(String),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
