//! Per-request scratch files
//!
//! Video transcoding needs real paths on disk. A [`ScratchFile`] owns one
//! uniquely named file in the scratch directory and removes it when dropped,
//! on success and error paths alike. Removal failures are logged and
//! counted, never propagated.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::metrics::PipelineMetrics;

/// A file in the scratch directory that is deleted on drop
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a unique path without creating the file
    ///
    /// The scratch directory is created if missing. `name_hint` only
    /// contributes a readable suffix; uniqueness comes from a UUID prefix.
    pub async fn reserve(dir: &Path, name_hint: &str) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let file_name = format!("{}-{}", Uuid::new_v4().simple(), sanitize(name_hint));
        Ok(Self {
            path: dir.join(file_name),
        })
    }

    /// Create a scratch file holding `data`
    pub async fn write(dir: &Path, name_hint: &str, data: &[u8]) -> io::Result<Self> {
        let scratch = Self::reserve(dir, name_hint).await?;
        tokio::fs::write(&scratch.path, data).await?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch file"
                );
                PipelineMetrics::global().scratch_cleanup_failures.inc();
            }
        }
    }
}

/// Last path component with anything outside `[A-Za-z0-9._-]` replaced
fn sanitize(name_hint: &str) -> String {
    let base = name_hint.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "scratch".to_string()
    } else {
        cleaned
    }
}
