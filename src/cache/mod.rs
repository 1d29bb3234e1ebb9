//! Cache key derivation for transformed derivatives
//!
//! A derivative is addressed by the full request path it was produced from,
//! directives included and in their original order. The key never looks at
//! what the directives mean, so `/t/format:webp/quality:80/x.jpg` and
//! `/t/quality:80/format:webp/x.jpg` are two different entries.
//!
//! Entries are write-once and never expire; eviction is out of scope and is
//! left to whatever removes files or objects behind the storage backend.

mod key;

pub use key::CacheKey;
