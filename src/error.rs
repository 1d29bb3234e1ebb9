// Error types module

use thiserror::Error;

use crate::directive::PathError;
use crate::image_optimizer::ImageError;
use crate::storage::StorageError;
use crate::video::VideoError;

/// Everything that can end a transformation request without a 200
///
/// The `Display` text is the plain-text response body.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Origin path is empty, absolute, or escapes the store root
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Origin is absent from the authoritative store
    #[error("File not found: {path}. Make sure the file exists in {store}.")]
    NotFound { path: String, store: String },

    /// Origin extension is neither an image nor a video type
    #[error("Unsupported file type")]
    UnsupportedType,

    #[error("Processing failed: {0}")]
    Image(#[from] ImageError),

    #[error("Processing failed: {0}")]
    Video(#[from] VideoError),

    /// Origin existed but could not be read
    #[error("Processing failed: {0}")]
    Origin(#[from] StorageError),

    #[error("Processing failed: {0}")]
    Internal(String),

    /// Request exceeded `server.request_timeout_secs`
    #[error("Processing failed: request timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// Too many transformations in flight
    #[error("Server is busy, please retry later")]
    Overloaded,
}

impl PipelineError {
    /// Maps pipeline errors to HTTP status codes
    ///
    /// - InvalidPath, UnsupportedType → 400
    /// - NotFound → 404
    /// - Image, Video, Origin, Internal → 500
    /// - Overloaded → 503
    /// - TimedOut → 504
    pub fn to_http_status(&self) -> u16 {
        match self {
            PipelineError::InvalidPath(_) | PipelineError::UnsupportedType => 400,
            PipelineError::NotFound { .. } => 404,
            PipelineError::Image(_)
            | PipelineError::Video(_)
            | PipelineError::Origin(_)
            | PipelineError::Internal(_) => 500,
            PipelineError::Overloaded => 503,
            PipelineError::TimedOut { .. } => 504,
        }
    }

    /// Label for the requests metric
    pub fn outcome(&self) -> &'static str {
        match self {
            PipelineError::InvalidPath(_) => "invalid_path",
            PipelineError::NotFound { .. } => "not_found",
            PipelineError::UnsupportedType => "unsupported",
            PipelineError::Image(_) | PipelineError::Video(_) => "transform_failed",
            PipelineError::Origin(_) | PipelineError::Internal(_) => "internal_error",
            PipelineError::Overloaded => "overloaded",
            PipelineError::TimedOut { .. } => "timeout",
        }
    }
}
