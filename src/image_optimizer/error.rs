//! Image transformation error types
//!
//! Every variant is a processing failure from the caller's point of view;
//! the pipeline reports them all as `Processing failed: <message>`.

use std::fmt;

/// Errors that can occur while transforming an image
#[derive(Debug, Clone)]
pub enum ImageError {
    // === Decoding Errors ===
    /// Failed to decode image data
    DecodeFailed { message: String },
    /// Decoded dimensions exceed the configured pixel budget
    SourceTooLarge {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    // === Processing Errors ===
    /// Resize operation failed
    ResizeFailed { message: String },
    /// Encoding to output format failed
    EncodeFailed { format: String, message: String },
    /// Processing took too long
    ProcessingTimeout { timeout_ms: u64 },
    /// The blocking worker died before returning a result
    WorkerFailed { message: String },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::SourceTooLarge {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::ProcessingTimeout { timeout_ms } => {
                write!(f, "Processing timeout after {}ms", timeout_ms)
            }
            ImageError::WorkerFailed { message } => {
                write!(f, "Image worker failed: {}", message)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn source_too_large(width: u32, height: u32, max_pixels: u64) -> Self {
        ImageError::SourceTooLarge {
            width,
            height,
            pixels: width as u64 * height as u64,
            max_pixels,
        }
    }
}
