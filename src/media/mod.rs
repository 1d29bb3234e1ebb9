//! Media kind dispatch by origin extension

use crate::constants::FALLBACK_CONTENT_TYPE;
use crate::directive::TransformSpec;
use crate::image_optimizer::OutputFormat;
use crate::video::VideoContainer;

/// What kind of transformation an origin gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image(OutputFormat),
    Video(VideoContainer),
    Unsupported,
}

impl MediaKind {
    /// Classify a lowercased origin extension
    pub fn from_extension(ext: Option<&str>) -> Self {
        let Some(ext) = ext else {
            return Self::Unsupported;
        };
        if let Some(format) = OutputFormat::from_extension(ext) {
            return Self::Image(format);
        }
        if let Some(container) = VideoContainer::from_extension(ext) {
            return Self::Video(container);
        }
        Self::Unsupported
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Unsupported => "unsupported",
        }
    }

    /// Content type of the derivative this request produces
    ///
    /// The extension decides unless a valid `format` directive switches the
    /// output. Computed from the request alone, so cache hits and fresh
    /// transformations answer with the same header.
    pub fn response_content_type(&self, spec: &TransformSpec) -> &'static str {
        let format = spec.get("format");
        match self {
            Self::Image(source) => format
                .and_then(OutputFormat::from_directive)
                .unwrap_or(*source)
                .content_type(),
            Self::Video(source) => format
                .and_then(VideoContainer::from_extension)
                .unwrap_or(*source)
                .content_type(),
            Self::Unsupported => FALLBACK_CONTENT_TYPE,
        }
    }
}
