//! AVIF decoding
//!
//! `image` 0.24 only writes AVIF. Origins are read by parsing the HEIF
//! container with `avif-parse` and decoding the AV1 payloads with `rav1d`.
//! The colour item is converted from YUV with BT.601 coefficients; a
//! separate alpha item, when present, supplies the alpha channel.

use std::io::Cursor;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use image::{DynamicImage, RgbaImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib::{
    dav1d_close, dav1d_data_create, dav1d_data_unref, dav1d_default_settings, dav1d_get_picture,
    dav1d_open, dav1d_picture_unref, dav1d_send_data,
};

use super::error::ImageError;

/// Whether `data` opens with an `ftyp` box carrying an AVIF brand
pub fn is_avif(data: &[u8]) -> bool {
    data.len() >= 12 && &data[4..8] == b"ftyp" && matches!(&data[8..12], b"avif" | b"avis")
}

/// Frame size from the container metadata, without decoding pixels
pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let avif = avif_parse::read_avif(&mut Cursor::new(data)).ok()?;
    let meta = avif.primary_item_metadata().ok()?;
    Some((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Decode an AVIF file into an RGBA image
pub fn decode(data: &[u8]) -> Result<DynamicImage, ImageError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| ImageError::decode_failed(format!("invalid AVIF container: {e:?}")))?;

    let color = decode_frame(&avif.primary_item)?;
    let alpha = match &avif.alpha_item {
        Some(item) => Some(decode_frame(item)?),
        None => None,
    }
    .filter(|a| a.width == color.width && a.height == color.height);

    let mut rgba = Vec::with_capacity(color.rgb.len() / 3 * 4);
    for (i, px) in color.rgb.chunks_exact(3).enumerate() {
        // a monochrome alpha frame decodes to grey, any channel holds the value
        let a = alpha.as_ref().map_or(255, |frame| frame.rgb[i * 3]);
        rgba.extend_from_slice(&[px[0], px[1], px[2], a]);
    }

    RgbaImage::from_raw(color.width, color.height, rgba)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ImageError::decode_failed("AVIF frame does not match its dimensions"))
}

/// One decoded AV1 frame as interleaved RGB8
struct Frame {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

fn decode_frame(av1: &[u8]) -> Result<Frame, ImageError> {
    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| ImageError::decode_failed("rav1d settings unavailable"))?;
    let mut settings = unsafe {
        dav1d_default_settings(settings_ptr);
        settings.assume_init()
    };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(rav1d_failed("open", rc.0));
    }

    let frame = (|| {
        let mut data = Dav1dData::default();
        let buf = unsafe { dav1d_data_create(NonNull::new(&mut data), av1.len()) };
        if buf.is_null() {
            return Err(ImageError::decode_failed("rav1d could not allocate input"));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

        let rc = unsafe { dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(rav1d_failed("send_data", rc.0));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(rav1d_failed("get_picture", rc.0));
        }

        let frame = picture_to_rgb(&pic);
        unsafe { dav1d_picture_unref(NonNull::new(&mut pic)) };
        frame
    })();

    unsafe { dav1d_close(NonNull::new(&mut ctx)) };
    frame
}

fn picture_to_rgb(pic: &Dav1dPicture) -> Result<Frame, ImageError> {
    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| ImageError::decode_failed("rav1d returned an empty plane"))
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let layout = pic.p.layout;
    let y = plane(0)?;

    let planes = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        Planes {
            y,
            u: y,
            v: y,
            y_stride: pic.stride[0],
            uv_stride: 0,
            bpc: pic.p.bpc as u32,
            subsample: (false, false),
            monochrome: true,
        }
    } else {
        let subsample = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            other => {
                return Err(ImageError::decode_failed(format!(
                    "unsupported AVIF pixel layout {other}"
                )))
            }
        };
        Planes {
            y,
            u: plane(1)?,
            v: plane(2)?,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            bpc: pic.p.bpc as u32,
            subsample,
            monochrome: false,
        }
    };

    Ok(Frame {
        width,
        height,
        rgb: planes.to_rgb(width, height),
    })
}

/// Borrowed YUV planes of a decoded picture
struct Planes {
    y: *const u8,
    u: *const u8,
    v: *const u8,
    y_stride: isize,
    uv_stride: isize,
    bpc: u32,
    /// Horizontal and vertical chroma subsampling
    subsample: (bool, bool),
    monochrome: bool,
}

impl Planes {
    fn to_rgb(&self, width: u32, height: u32) -> Vec<u8> {
        let max = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max;
        let to_u8 = |v: f32| (v * scale).clamp(0.0, 255.0) as u8;

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for row in 0..height {
            for col in 0..width {
                let luma = self.sample(self.y, self.y_stride, col, row);
                if self.monochrome {
                    let v = to_u8(luma);
                    rgb.extend_from_slice(&[v, v, v]);
                    continue;
                }

                let cx = if self.subsample.0 { col / 2 } else { col };
                let cy = if self.subsample.1 { row / 2 } else { row };
                let cb = self.sample(self.u, self.uv_stride, cx, cy) - center;
                let cr = self.sample(self.v, self.uv_stride, cx, cy) - center;

                rgb.extend_from_slice(&[
                    to_u8(luma + 1.402 * cr),
                    to_u8(luma - 0.344_136 * cb - 0.714_136 * cr),
                    to_u8(luma + 1.772 * cb),
                ]);
            }
        }
        rgb
    }

    /// High bit depths are stored as native-endian u16
    fn sample(&self, base: *const u8, stride: isize, x: u32, y: u32) -> f32 {
        let row = y as isize * stride;
        if self.bpc <= 8 {
            unsafe { *base.offset(row + x as isize) as f32 }
        } else {
            unsafe { (base.offset(row + x as isize * 2) as *const u16).read_unaligned() as f32 }
        }
    }
}

fn rav1d_failed(step: &str, code: i32) -> ImageError {
    ImageError::decode_failed(format!("rav1d {} failed ({})", step, code))
}
