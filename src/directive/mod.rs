//! Transformation directive parsing
//!
//! A transformation URL carries its parameters as `key:value` path segments
//! in front of the origin path:
//!
//! ```text
//! /t/resize:800x600/crop:fit/background:000/photos/cat.jpg
//!    └──────────── directives ───────────┘ └─ origin ─┘
//! ```
//!
//! Parsing never fails on a bad value. [`TransformSpec`] keeps every
//! directive as the raw string it arrived as; the typed views
//! (`ImageParams`, `VideoParams`) decide per directive whether the value is
//! usable and silently drop it otherwise.

use std::fmt;

use thiserror::Error;

use crate::constants::TRANSFORM_ROUTE_PREFIX;

/// Ordered directive set parsed from a request path
///
/// Keys keep the position of their first appearance. A repeated key
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSpec {
    directives: Vec<(String, String)>,
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a directive, replacing the value of an existing key in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.directives.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.directives.push((key, value)),
        }
    }

    /// Raw value of a directive
    pub fn get(&self, key: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.directives.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}:{}", key, value)?;
        }
        Ok(())
    }
}

/// Why an origin path was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("no origin file in request path")]
    Empty,
    #[error("origin path must be relative")]
    Absolute,
    #[error("origin path must not contain '.' or '..' segments")]
    Traversal,
}

/// A request path split into directives and origin path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub spec: TransformSpec,
    /// Origin path relative to the store root, percent-decoded
    pub origin_path: String,
    /// Lowercased extension of the origin file, if any
    pub extension: Option<String>,
}

impl ParsedRequest {
    /// Reject origin paths that could escape the store root
    pub fn validate_origin(&self) -> Result<(), PathError> {
        if self.origin_path.is_empty() {
            return Err(PathError::Empty);
        }
        if self.origin_path.starts_with('/') || self.origin_path.starts_with('\\') {
            return Err(PathError::Absolute);
        }
        let traverses = self
            .origin_path
            .split(['/', '\\'])
            .any(|segment| segment == ".." || segment == "." || segment.contains('\0'));
        if traverses {
            return Err(PathError::Traversal);
        }
        Ok(())
    }
}

/// Split a request path into its directive spec and origin path
///
/// The route prefix (`/t/`) is optional. Leading segments containing `:` are
/// directives, split on their first `:`; the first segment without one
/// starts the origin path, and everything from there on belongs to it.
pub fn parse_request_path(path: &str) -> ParsedRequest {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let rest = path
        .strip_prefix(TRANSFORM_ROUTE_PREFIX)
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(path);

    let mut spec = TransformSpec::new();
    let mut origin_segments: Vec<String> = Vec::new();

    for segment in rest.split('/').filter(|s| !s.is_empty()) {
        if origin_segments.is_empty() {
            if let Some((key, value)) = segment.split_once(':') {
                spec.insert(decode(key), decode(value));
                continue;
            }
        }
        origin_segments.push(decode(segment));
    }

    let origin_path = origin_segments.join("/");
    let extension = file_extension(&origin_path);

    ParsedRequest {
        spec,
        origin_path,
        extension,
    }
}

/// Lowercased extension of the last path segment
pub fn file_extension(path: &str) -> Option<String> {
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
