//! Built-in endpoint handlers.
//!
//! - `/` - liveness banner
//! - `/health` - health check with uptime and origin store
//! - `/metrics` - Prometheus metrics export
//!
//! Handlers return `EndpointResponse` instead of writing to the session so
//! they stay testable without a live connection.

use std::time::Instant;

use crate::metrics::export_prometheus;

/// Response from a built-in endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Response body
    pub body: String,
}

impl EndpointResponse {
    /// Create a JSON response with the given status and body.
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    /// Create a plain text response in the Prometheus exposition format.
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body,
        }
    }
}

/// Which built-in endpoint a path addresses, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEndpoint {
    Root,
    Health,
    Metrics,
}

impl SpecialEndpoint {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(SpecialEndpoint::Root),
            "/health" => Some(SpecialEndpoint::Health),
            "/metrics" => Some(SpecialEndpoint::Metrics),
            _ => None,
        }
    }
}

pub fn handle_root() -> EndpointResponse {
    EndpointResponse::text(200, "Server is running.")
}

/// Generate response for /health endpoint.
///
/// Reports uptime, version and which store currently serves origins.
pub fn handle_health(start_time: Instant, storage: &str) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "storage": storage,
    })
    .to_string();

    EndpointResponse::json(200, body)
}

pub fn handle_metrics() -> EndpointResponse {
    EndpointResponse::prometheus(export_prometheus())
}
