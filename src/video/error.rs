use std::io;

use thiserror::Error;

/// Errors from the ffmpeg transcoding path
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("failed to spawn ffmpeg at '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("ffmpeg exited with status {}: {stderr}", exit_label(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("transcoding timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("scratch file I/O failed: {0}")]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
