//! Decompression bomb protection
//!
//! Dimensions are read from the container header before any pixel data is
//! decoded, so a tiny file that expands to gigapixels is refused cheaply.

use std::io::Cursor;

use image::io::Reader as ImageReader;

use super::avif;
use super::error::ImageError;

/// Validate image dimensions against the pixel budget
pub fn validate_dimensions(width: u32, height: u32, max_pixels: u64) -> Result<(), ImageError> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(ImageError::source_too_large(width, height, max_pixels));
    }
    Ok(())
}

/// Read dimensions from the header and validate them
///
/// Formats whose header cannot be probed are let through; the full decode
/// reports them.
pub fn check_source(data: &[u8], max_pixels: u64) -> Result<(), ImageError> {
    if avif::is_avif(data) {
        return match avif::dimensions(data) {
            Some((width, height)) => validate_dimensions(width, height, max_pixels),
            None => Ok(()),
        };
    }

    let reader = match ImageReader::new(Cursor::new(data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => return Ok(()),
    };
    match reader.into_dimensions() {
        Ok((width, height)) => validate_dimensions(width, height, max_pixels),
        Err(_) => Ok(()),
    }
}
