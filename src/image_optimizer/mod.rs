//! Image transformation engine
//!
//! Decodes an origin image, applies the directives carried by an
//! [`ImageParams`] and re-encodes the result. All pixel work is synchronous;
//! [`process_image_bounded`] moves it onto the blocking pool with a
//! wall-clock limit so request handlers never stall on a large decode.
//!
//! Directive values are fail-open: a value that does not parse drops that
//! one step, see [`params`].

pub mod avif;
pub mod config;
pub mod encoder;
pub mod error;
pub mod geometry;
pub mod params;
pub mod processor;
pub mod security;

pub use config::ImageConfig;
pub use encoder::{EncodedImage, EncoderFactory, EncoderQuality, ImageEncoder};
pub use error::ImageError;
pub use params::{CropMode, Gravity, ImageParams, OutputFormat, Rotation};
pub use processor::{process_image, process_image_bounded, ProcessedImage};
