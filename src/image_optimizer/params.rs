//! Typed view over transformation directives
//!
//! Each directive is validated on its own. A value that cannot be used is
//! dropped with a debug log and the matching transform step is skipped; the
//! remaining directives still apply.

use image::Rgba;

use super::config::ImageConfig;
use crate::directive::TransformSpec;

/// Image output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Gif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Gif => "image/gif",
        }
    }

    /// Format named by a `format:` directive
    pub fn from_directive(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Source format implied by an origin file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

/// How the image is fitted into the `resize` box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Cover the box, crop the excess at the gravity anchor (default)
    #[default]
    Fill,
    /// Contain inside the box, letterbox with the background
    Fit,
    /// Stretch to the box, ignoring aspect ratio
    Scale,
    /// Cover the box and crop at the gravity anchor
    Crop,
    /// Contain inside the box, pad with the background (same geometry as `Fit`)
    Pad,
}

impl CropMode {
    /// Unknown modes fall back to `Fill`
    pub fn from_directive(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "fit" => Self::Fit,
            "scale" => Self::Scale,
            "crop" => Self::Crop,
            "pad" => Self::Pad,
            _ => Self::Fill,
        }
    }
}

/// Anchor used when a crop discards part of the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    Center,
    North,
    South,
    East,
    West,
    /// Face-seeking anchor; no detector is bundled, resolves to center
    Face,
    /// Content-aware anchor; resolves to center
    Auto,
}

impl Gravity {
    /// Unknown values fall back to `Center`
    pub fn from_directive(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "north" => Self::North,
            "south" => Self::South,
            "east" => Self::East,
            "west" => Self::West,
            "face" => Self::Face,
            "auto" => Self::Auto,
            _ => Self::Center,
        }
    }
}

/// Rotation requested by the `rotate` directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Follow the EXIF orientation tag
    Auto,
    /// Clockwise degrees, normalized to 0..360
    Degrees(u32),
}

impl Rotation {
    pub fn from_directive(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("auto") {
            return Some(Self::Auto);
        }
        value
            .trim()
            .parse::<i64>()
            .ok()
            .map(|deg| Self::Degrees(deg.rem_euclid(360) as u32))
    }
}

/// Parse a background colour
///
/// Three or six hex digits (with or without `#`) give an opaque colour,
/// `transparent` gives zero alpha, anything else is opaque white.
pub fn parse_background(value: &str) -> Rgba<u8> {
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    if value.eq_ignore_ascii_case("transparent") {
        return Rgba([0, 0, 0, 0]);
    }

    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return WHITE;
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    let rgb = match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..=i].repeat(2));
            (expand(0), expand(1), expand(2))
        }
        6 => (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6])),
        _ => return WHITE,
    };

    match rgb {
        (Some(r), Some(g), Some(b)) => Rgba([r, g, b, 255]),
        _ => WHITE,
    }
}

/// Parse a `WxH` resize value
///
/// Each side is read like a lenient integer parse (leading digits, so `800px`
/// reads as 800). Returns `None` when the `x` is missing, a side has no
/// digits, a side is not positive, or a side exceeds the configured maximum.
pub fn parse_resize(value: &str, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    let width = parse_leading_int(w)?;
    let height = parse_leading_int(h)?;

    if width <= 0 || height <= 0 {
        return None;
    }
    if width > i64::from(max_width) || height > i64::from(max_height) {
        return None;
    }
    Some((width as u32, height as u32))
}

/// Parse a `W:H` aspect ratio with positive integer sides
pub fn parse_aspect(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(':')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Parse a 1-100 quality value
pub fn parse_quality(value: &str) -> Option<u8> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|q| (1..=100).contains(q))
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let n: i64 = digits[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}

/// Image transformation parameters derived from a [`TransformSpec`]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    /// Target box; `None` leaves pixel dimensions alone
    pub resize: Option<(u32, u32)>,
    pub crop: CropMode,
    pub gravity: Gravity,
    pub rotate: Option<Rotation>,
    /// Explicit background; `None` means the mode's default (opaque white)
    pub background: Option<Rgba<u8>>,
    pub quality: Option<u8>,
    /// Output format; `None` keeps the source format
    pub format: Option<OutputFormat>,
    /// Aspect crop, applied only when `resize` is absent
    pub aspect: Option<(u32, u32)>,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            resize: None,
            crop: CropMode::Fill,
            gravity: Gravity::Center,
            rotate: None,
            background: None,
            quality: None,
            format: None,
            aspect: None,
        }
    }
}

impl ImageParams {
    pub fn from_spec(spec: &TransformSpec, config: &ImageConfig) -> Self {
        let resize = spec.get("resize").and_then(|value| {
            let parsed = parse_resize(value, config.max_width, config.max_height);
            if parsed.is_none() {
                tracing::debug!(value, "Ignoring unusable resize directive");
            }
            parsed
        });

        let quality = spec.get("quality").and_then(|value| {
            let parsed = parse_quality(value);
            if parsed.is_none() {
                tracing::debug!(value, "Ignoring out-of-range quality directive");
            }
            parsed
        });

        let format = spec.get("format").and_then(|value| {
            let parsed = OutputFormat::from_directive(value);
            if parsed.is_none() {
                tracing::debug!(value, "Ignoring unknown format directive");
            }
            parsed
        });

        Self {
            resize,
            crop: spec
                .get("crop")
                .map(CropMode::from_directive)
                .unwrap_or_default(),
            gravity: spec
                .get("gravity")
                .map(Gravity::from_directive)
                .unwrap_or_default(),
            rotate: spec.get("rotate").and_then(Rotation::from_directive),
            background: spec.get("background").map(parse_background),
            quality,
            format,
            aspect: spec.get("aspect").and_then(parse_aspect),
        }
    }

    /// Background to paint exposed canvas with
    pub fn background_or_default(&self) -> Rgba<u8> {
        self.background.unwrap_or(Rgba([255, 255, 255, 255]))
    }
}
