//! Video transformation through the system `ffmpeg` binary
//!
//! The transcoder reads the origin from a file path and writes into a
//! scratch file, so both sides work for local and cloud origins alike.
//! Directives map onto an ffmpeg filter chain using the same names and the
//! same fail-open rules as images.

mod config;
mod error;

pub use config::VideoConfig;
pub use error::VideoError;

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use image::Rgba;

use crate::directive::TransformSpec;
use crate::image_optimizer::params::{parse_background, parse_resize};
use crate::image_optimizer::{CropMode, Gravity, ImageConfig, Rotation};
use crate::scratch::ScratchFile;

/// Output container for video derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoContainer {
    Mp4,
    Mov,
    WebM,
}

impl VideoContainer {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::Mov),
            "webm" => Some(Self::WebM),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::WebM => "webm",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Mov => "video/quicktime",
            Self::WebM => "video/webm",
        }
    }

    /// Muxer name passed to `-f`
    fn muxer(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::WebM => "webm",
        }
    }

    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            Self::Mp4 | Self::Mov => &[
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "23",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-movflags",
                "+faststart",
            ],
            Self::WebM => &[
                "-c:v",
                "libvpx-vp9",
                "-crf",
                "32",
                "-b:v",
                "0",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "libopus",
            ],
        }
    }
}

/// Video transformation parameters derived from a [`TransformSpec`]
#[derive(Debug, Clone, PartialEq)]
pub struct VideoParams {
    /// Target box, already rounded down to even sides
    pub resize: Option<(u32, u32)>,
    pub crop: CropMode,
    pub gravity: Gravity,
    pub rotate: Option<Rotation>,
    pub background: Rgba<u8>,
    pub container: VideoContainer,
}

impl VideoParams {
    /// Build parameters for an origin whose own container is `source`
    ///
    /// A `format` directive naming a video container switches containers;
    /// image formats and unknown values keep `source`.
    pub fn from_spec(spec: &TransformSpec, source: VideoContainer, limits: &ImageConfig) -> Self {
        let resize = spec
            .get("resize")
            .and_then(|value| parse_resize(value, limits.max_width, limits.max_height))
            .map(|(w, h)| (even(w), even(h)));

        let container = spec
            .get("format")
            .and_then(VideoContainer::from_extension)
            .unwrap_or(source);

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
            background: spec
                .get("background")
                .map(parse_background)
                .unwrap_or(Rgba([255, 255, 255, 255])),
            container,
        }
    }

    /// ffmpeg `-vf` filter chain, empty when nothing changes
    pub fn filter_chain(&self) -> String {
        let mut filters: Vec<String> = Vec::new();

        match self.rotate {
            Some(Rotation::Degrees(90)) => filters.push("transpose=1".to_string()),
            Some(Rotation::Degrees(180)) => filters.push("hflip,vflip".to_string()),
            Some(Rotation::Degrees(270)) => filters.push("transpose=2".to_string()),
            Some(Rotation::Degrees(0)) | Some(Rotation::Auto) | None => {}
            Some(Rotation::Degrees(other)) => {
                tracing::debug!(degrees = other, "Ignoring non-right-angle video rotation");
            }
        }

        if let Some((w, h)) = self.resize {
            filters.push(self.resize_filter(w, h));
        }

        filters.join(",")
    }

    fn resize_filter(&self, w: u32, h: u32) -> String {
        match self.crop {
            CropMode::Scale => format!("scale={w}:{h}"),
            CropMode::Fill | CropMode::Crop => {
                let (x, y) = crop_anchor(self.gravity);
                format!(
                    "scale={w}:{h}:force_original_aspect_ratio=increase:force_divisible_by=2,\
                     crop={w}:{h}:{x}:{y}"
                )
            }
            CropMode::Fit | CropMode::Pad => format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease:force_divisible_by=2,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={}",
                pad_color(self.background)
            ),
        }
    }
}

/// Round down to an even value, minimum 2
fn even(n: u32) -> u32 {
    (n & !1).max(2)
}

fn crop_anchor(gravity: Gravity) -> (&'static str, &'static str) {
    match gravity {
        Gravity::North => ("(iw-ow)/2", "0"),
        Gravity::South => ("(iw-ow)/2", "ih-oh"),
        Gravity::East => ("iw-ow", "(ih-oh)/2"),
        Gravity::West => ("0", "(ih-oh)/2"),
        Gravity::Center | Gravity::Face | Gravity::Auto => ("(iw-ow)/2", "(ih-oh)/2"),
    }
}

/// Video has no alpha; transparent pads are black
fn pad_color(background: Rgba<u8>) -> String {
    if background[3] == 0 {
        return "0x000000".to_string();
    }
    format!(
        "0x{:02x}{:02x}{:02x}",
        background[0], background[1], background[2]
    )
}

/// Runs ffmpeg for one transformation at a time
#[derive(Debug, Clone)]
pub struct VideoTranscoder {
    ffmpeg_path: String,
    timeout: Duration,
}

impl VideoTranscoder {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: config.timeout(),
        }
    }

    /// Full ffmpeg argument list for one transcode
    pub fn build_args(&self, input: &Path, output: &Path, params: &VideoParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());

        let filters = params.filter_chain();
        if !filters.is_empty() {
            args.push("-vf".into());
            args.push(filters.into());
        }

        args.extend(params.container.codec_args().iter().map(OsString::from));
        args.push("-f".into());
        args.push(params.container.muxer().into());
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Transcode `input` and return the encoded bytes
    ///
    /// The output goes to a scratch file under `scratch_dir` that is removed
    /// before returning, whatever the outcome.
    pub async fn transcode(
        &self,
        input: &Path,
        params: &VideoParams,
        scratch_dir: &Path,
    ) -> Result<Vec<u8>, VideoError> {
        let output = ScratchFile::reserve(
            scratch_dir,
            &format!("out.{}", params.container.extension()),
        )
        .await?;

        let args = self.build_args(input, output.path(), params);
        tracing::debug!(
            ffmpeg = %self.ffmpeg_path,
            input = %input.display(),
            filters = %params.filter_chain(),
            "Starting ffmpeg"
        );

        let child = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VideoError::Spawn {
                path: self.ffmpeg_path.clone(),
                source,
            })?;

        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(VideoError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };

        if !result.status.success() {
            return Err(VideoError::Failed {
                code: result.status.code(),
                stderr: tail(&String::from_utf8_lossy(&result.stderr), 512),
            });
        }

        Ok(tokio::fs::read(output.path()).await?)
    }
}

/// Last `max` bytes of ffmpeg's stderr, on a char boundary
fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
