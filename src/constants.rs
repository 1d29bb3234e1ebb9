// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Config structs pull their serde defaults from here so the YAML surface
// and the code agree on one number.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum concurrent transformation requests
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1000;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

// =============================================================================
// Storage defaults
// =============================================================================

/// Default root for origin assets in local mode
pub const DEFAULT_PUBLIC_DIR: &str = "./public";

/// Default root for cached derivatives
pub const DEFAULT_CACHE_DIR: &str = "./cache";

/// Default directory for per-request scratch files
pub const DEFAULT_SCRATCH_DIR: &str = "./temp";

/// Default cloud storage operation timeout in seconds
pub const DEFAULT_CLOUD_TIMEOUT_SECS: u64 = 20;

/// Default object key prefix for cached derivatives in the bucket
pub const DEFAULT_CLOUD_CACHE_PREFIX: &str = "cache";

// =============================================================================
// Transform defaults
// =============================================================================

/// Default quality for lossy output formats (JPEG, WebP, AVIF)
pub const DEFAULT_QUALITY: u8 = 80;

/// Default maximum width/height accepted in a `resize` directive
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// Default maximum decoded source size (100 megapixels)
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

/// Default image processing timeout in seconds
pub const DEFAULT_TRANSFORM_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Video defaults
// =============================================================================

/// Default ffmpeg binary, resolved through PATH
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Default transcoding timeout in seconds
pub const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// HTTP surface
// =============================================================================

/// Route prefix for transformation requests
pub const TRANSFORM_ROUTE_PREFIX: &str = "/t/";

/// Cache-Control for derivatives; entries are write-once and never change
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Retry-After hint (seconds) sent with 503 responses
pub const OVERLOADED_RETRY_AFTER_SECS: u64 = 5;

/// Content type used when nothing better is known
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
