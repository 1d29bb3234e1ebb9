use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FFMPEG_PATH, DEFAULT_VIDEO_TIMEOUT_SECS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// ffmpeg binary, absolute or resolved through PATH
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Wall-clock limit for one transcode
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: DEFAULT_FFMPEG_PATH.to_string(),
            timeout_secs: DEFAULT_VIDEO_TIMEOUT_SECS,
        }
    }
}

impl VideoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ffmpeg_path.trim().is_empty() {
            return Err("video.ffmpeg_path cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("video.timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_ffmpeg_path() -> String {
    DEFAULT_FFMPEG_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_VIDEO_TIMEOUT_SECS
}
