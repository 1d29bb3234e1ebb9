use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_DIMENSION, DEFAULT_MAX_SOURCE_PIXELS, DEFAULT_QUALITY,
    DEFAULT_TRANSFORM_TIMEOUT_SECS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Maximum width accepted in a `resize` directive
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,

    /// Maximum height accepted in a `resize` directive
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,

    /// Quality for lossy formats when no `quality` directive is given
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// Largest decoded source (width * height) the engine will touch
    #[serde(default = "default_max_source_pixels")]
    pub max_source_pixels: u64,

    /// Wall-clock limit for one image transformation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            default_quality: DEFAULT_QUALITY,
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
            timeout_secs: DEFAULT_TRANSFORM_TIMEOUT_SECS,
        }
    }
}

impl ImageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err("transform.max_width and transform.max_height must be > 0".to_string());
        }
        if !(1..=100).contains(&self.default_quality) {
            return Err(format!(
                "transform.default_quality must be 1-100, got {}",
                self.default_quality
            ));
        }
        if self.max_source_pixels == 0 {
            return Err("transform.max_source_pixels must be > 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("transform.timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_max_source_pixels() -> u64 {
    DEFAULT_MAX_SOURCE_PIXELS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TRANSFORM_TIMEOUT_SECS
}
