//! Image processing implementation
//!
//! decode → rotate → aspect crop → resize → encode

use std::io::Cursor;
use std::num::NonZeroU32;
use std::time::Duration;

use bytes::Bytes;
use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::imageops;
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use super::avif;
use super::config::ImageConfig;
use super::encoder::{EncoderFactory, EncoderQuality};
use super::error::ImageError;
use super::geometry::{anchor_offset, aspect_crop, contain_size};
use super::params::{CropMode, ImageParams, OutputFormat, Rotation};
use super::security::check_source;

/// Result of image processing
#[derive(Debug)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    /// Output dimensions (width, height)
    pub output_size: (u32, u32),
}

/// Run [`process_image`] on the blocking pool under the configured timeout
pub async fn process_image_bounded(
    data: Bytes,
    params: ImageParams,
    source_format: OutputFormat,
    config: ImageConfig,
) -> Result<ProcessedImage, ImageError> {
    let timeout = config.timeout();
    let task =
        tokio::task::spawn_blocking(move || process_image(&data, &params, source_format, &config));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ImageError::WorkerFailed {
            message: join_err.to_string(),
        }),
        Err(_) => Err(ImageError::ProcessingTimeout {
            timeout_ms: duration_ms(timeout),
        }),
    }
}

/// Transform encoded image bytes according to `params`
///
/// `source_format` is the format implied by the origin's extension and is
/// used for output when no `format` directive overrides it.
pub fn process_image(
    data: &[u8],
    params: &ImageParams,
    source_format: OutputFormat,
    config: &ImageConfig,
) -> Result<ProcessedImage, ImageError> {
    check_source(data, config.max_source_pixels)?;

    let img = decode_image(data, source_format)?;
    let background = params.background_or_default();

    let img = match params.rotate {
        Some(Rotation::Auto) => match read_orientation(data) {
            Some(orientation) => apply_orientation(img, orientation),
            None => img,
        },
        Some(Rotation::Degrees(degrees)) => rotate_degrees(img, degrees, background),
        None => img,
    };

    let img = match (params.resize, params.aspect) {
        (None, Some((ratio_w, ratio_h))) => {
            let (w, h) = aspect_crop(img.width(), img.height(), ratio_w, ratio_h);
            let (x, y) = anchor_offset(params.gravity, img.width(), img.height(), w, h);
            img.crop_imm(x, y, w, h)
        }
        _ => img,
    };

    let img = match params.resize {
        Some((box_w, box_h)) => fit_to_box(img, box_w, box_h, params, background)?,
        None => img,
    };

    let output_format = params.format.unwrap_or(source_format);
    let quality = EncoderQuality::with_quality(params.quality.unwrap_or(config.default_quality));
    let encoder = EncoderFactory::create(output_format, background);

    let (width, height) = (img.width(), img.height());
    let rgba = img.into_rgba8().into_raw();
    let encoded = encoder.encode(&rgba, width, height, quality)?;

    Ok(ProcessedImage {
        data: encoded.data,
        format: output_format,
        output_size: (width, height),
    })
}

/// Decode image data into a DynamicImage
///
/// AVIF goes through [`avif::decode`]; everything else is sniffed by `image`.
fn decode_image(data: &[u8], source_format: OutputFormat) -> Result<DynamicImage, ImageError> {
    if source_format == OutputFormat::Avif || avif::is_avif(data) {
        return avif::decode(data);
    }
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Apply the crop mode to reach the `box_w` x `box_h` target
fn fit_to_box(
    img: DynamicImage,
    box_w: u32,
    box_h: u32,
    params: &ImageParams,
    background: Rgba<u8>,
) -> Result<DynamicImage, ImageError> {
    let (src_w, src_h) = (img.width(), img.height());

    match params.crop {
        CropMode::Scale => resize_image(&img, box_w, box_h),
        CropMode::Fill | CropMode::Crop => {
            // crop in source space so no buffer outgrows the source or the box
            let (w, h) = aspect_crop(src_w, src_h, box_w, box_h);
            let (x, y) = anchor_offset(params.gravity, src_w, src_h, w, h);
            resize_image(&img.crop_imm(x, y, w, h), box_w, box_h)
        }
        CropMode::Fit | CropMode::Pad => {
            let (w, h) = contain_size(src_w, src_h, box_w, box_h);
            let inner = resize_image(&img, w, h)?;
            Ok(letterbox(&inner, box_w, box_h, background))
        }
    }
}

/// Centre `inner` on a `width` x `height` canvas filled with `background`
fn letterbox(inner: &DynamicImage, width: u32, height: u32, background: Rgba<u8>) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(width, height, background);
    let x = width.saturating_sub(inner.width()) / 2;
    let y = height.saturating_sub(inner.height()) / 2;
    imageops::overlay(&mut canvas, &inner.to_rgba8(), x as i64, y as i64);
    DynamicImage::ImageRgba8(canvas)
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, ImageError> {
    let src_w = img.width();
    let src_h = img.height();

    if src_w == target_w && src_h == target_h {
        return Ok(img.clone());
    }

    let src_width =
        NonZeroU32::new(src_w).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height =
        NonZeroU32::new(src_h).ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}

/// EXIF orientation tag (1-8) of the source, if present
fn read_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Undo the camera orientation recorded in EXIF
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Rotate clockwise by whole degrees
///
/// Right angles are lossless. Any other angle grows the canvas to hold the
/// rotated image and fills the exposed corners with `background`.
fn rotate_degrees(img: DynamicImage, degrees: u32, background: Rgba<u8>) -> DynamicImage {
    match degrees % 360 {
        0 => img,
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        other => rotate_arbitrary(&img.to_rgba8(), other as f64, background),
    }
}

fn rotate_arbitrary(src: &RgbaImage, degrees: f64, background: Rgba<u8>) -> DynamicImage {
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (src.width() as f64, src.height() as f64);

    let out_w = ((w * cos.abs() + h * sin.abs()).ceil() as u32).max(1);
    let out_h = ((w * sin.abs() + h * cos.abs()).ceil() as u32).max(1);

    let (src_cx, src_cy) = (w / 2.0, h / 2.0);
    let (dst_cx, dst_cy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    let out = RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // inverse of a clockwise rotation in y-down coordinates
        let sx = dx * cos + dy * sin + src_cx;
        let sy = -dx * sin + dy * cos + src_cy;
        if sx >= 0.0 && sy >= 0.0 && sx < w && sy < h {
            *src.get_pixel(sx as u32, sy as u32)
        } else {
            background
        }
    });

    DynamicImage::ImageRgba8(out)
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}
