use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No face detected in the image")]
    NoFaceDetected,

    #[error("Segmentation mask unavailable")]
    SegmentationUnavailable,

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Cannot resample an empty {width}x{height} raster")]
    EmptyRaster { width: u32, height: u32 },

    #[error("Invalid size preset: {0}")]
    InvalidPreset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config deserialization error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Coarse classification surfaced to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NoFace,
    Segmentation,
    Processing,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NoFaceDetected => ErrorCategory::NoFace,
            Error::SegmentationUnavailable => ErrorCategory::Segmentation,
            _ => ErrorCategory::Processing,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
