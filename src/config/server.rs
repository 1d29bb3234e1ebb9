//! Server configuration types.
//!
//! Listener address, worker threads, request timeout and the in-flight
//! request limit. Default values are sourced from `crate::constants`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_THREADS,
};

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Default timeout values
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Worker threads for the HTTP service
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Upper bound for one whole request, transformation included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Transformation requests allowed in flight before answering 503
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            threads: default_threads(),
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("server.address cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("server.port must be between 1 and 65535".to_string());
        }
        if self.threads == 0 {
            return Err("server.threads must be > 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("server.request_timeout_secs must be > 0".to_string());
        }
        if self.max_concurrent_requests == 0 {
            return Err("server.max_concurrent_requests must be > 0".to_string());
        }
        Ok(())
    }
}
