use std::fmt;

use thiserror::Error;

/// Stage of the upload chain that failed. The three stages are strictly
/// sequential; a failure at one stage means later stages were never attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStage {
    Blob,
    Url,
    Metadata,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Blob => "blob",
            UploadStage::Url => "url",
            UploadStage::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the capture/upload pipeline.
///
/// None of these are fatal to the session: they are recorded on the session
/// and retried on the next timer tick.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("video playback failed: {0}")]
    Playback(String),

    #[error("no active stream attached to the capture surface")]
    SurfaceUnavailable,

    #[error("frame encoding failed: {0}")]
    Encoding(String),

    #[error("upload failed at {stage} stage: {reason}")]
    Upload { stage: UploadStage, reason: String },

    #[error("{0} gallery entries failed to resolve")]
    ListingPartialFailure(usize),
}
