//! Cache key type

use sha2::{Digest, Sha256};
use std::fmt;

use crate::directive::file_extension;

/// Stable identifier of a cached derivative
///
/// Lowercase hex SHA-256 of the raw request path, followed by the origin's
/// extension when it has one (`<digest>.webp`). The result is safe to use
/// both as a file name and as an object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a request path
    pub fn derive(request_path: &str) -> Self {
        let digest = hex::encode(Sha256::digest(request_path.as_bytes()));
        let extension = file_extension(request_path)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

        match extension {
            Some(ext) => CacheKey(format!("{}.{}", digest, ext)),
            None => CacheKey(digest),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
