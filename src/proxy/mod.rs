//! HTTP surface
//!
//! [`KagamiApp`] answers every request itself; there is no upstream. Paths
//! under `/t/` go through the [`TransformPipeline`], a handful of fixed paths
//! are built-in endpoints, and everything else is a 404.
//!
//! Routing lives in [`KagamiApp::handle`], which takes a method and a path
//! and returns an [`AppResponse`]; the Pingora [`ServeHttp`] impl is a thin
//! adapter around it so routing can be tested without a socket.

pub mod init;
pub mod special_endpoints;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{Method, Response, StatusCode};
use pingora_core::apps::http_app::ServeHttp;
use pingora_core::protocols::http::ServerSession;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::constants::{
    IMMUTABLE_CACHE_CONTROL, OVERLOADED_RETRY_AFTER_SECS, TRANSFORM_ROUTE_PREFIX,
};
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::pipeline::TransformPipeline;
use special_endpoints::{
    handle_health, handle_metrics, handle_root, EndpointResponse, SpecialEndpoint,
};

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// A fully decided response, before it is written to the connection
#[derive(Debug, Clone)]
pub struct AppResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(HeaderName, String)>,
    pub body: Bytes,
}

impl AppResponse {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            headers: Vec::new(),
            body: Bytes::from(body.into()),
        }
    }

    fn from_error(err: &PipelineError) -> Self {
        let mut response = Self::text(err.to_http_status(), err.to_string());
        if matches!(err, PipelineError::Overloaded) {
            response
                .headers
                .push((header::RETRY_AFTER, OVERLOADED_RETRY_AFTER_SECS.to_string()));
        }
        response
    }

    /// Value of an extra header, if set
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert into an `http` response; HEAD keeps every header but drops the body
    pub fn into_http(self, head: bool) -> Response<Vec<u8>> {
        let length = self.body.len();
        let body = if head { Vec::new() } else { self.body.to_vec() };

        let mut response = Response::new(body);
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        for (name, value) in self.headers {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(e) => tracing::warn!(header = %name, error = %e, "Dropping invalid header value"),
            }
        }
        response
    }
}

impl From<EndpointResponse> for AppResponse {
    fn from(endpoint: EndpointResponse) -> Self {
        Self {
            status: endpoint.status,
            content_type: endpoint.content_type,
            headers: Vec::new(),
            body: Bytes::from(endpoint.body),
        }
    }
}

/// The media server application
pub struct KagamiApp {
    pipeline: Arc<TransformPipeline>,
    request_semaphore: Arc<Semaphore>,
    request_timeout: Duration,
    start_time: Instant,
}

impl KagamiApp {
    pub fn new(
        pipeline: TransformPipeline,
        max_concurrent_requests: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            request_semaphore: Arc::new(Semaphore::new(max_concurrent_requests)),
            request_timeout,
            start_time: Instant::now(),
        }
    }

    /// Build the backends and pipeline described by `config`
    pub async fn from_config(config: &Config) -> Self {
        let pipeline = init::build_pipeline(config).await;
        Self::new(
            pipeline,
            config.server.max_concurrent_requests,
            config.server.request_timeout(),
        )
    }

    /// Route one request
    pub async fn handle(&self, method: &Method, path: &str) -> AppResponse {
        if method != Method::GET && method != Method::HEAD {
            let mut response = AppResponse::text(405, "Method not allowed");
            response.headers.push((header::ALLOW, "GET, HEAD".to_string()));
            return response;
        }

        if let Some(endpoint) = SpecialEndpoint::from_path(path) {
            return match endpoint {
                SpecialEndpoint::Root => handle_root(),
                SpecialEndpoint::Health => {
                    handle_health(self.start_time, &self.pipeline.origin_store_name())
                }
                SpecialEndpoint::Metrics => handle_metrics(),
            }
            .into();
        }

        if !path.starts_with(TRANSFORM_ROUTE_PREFIX) {
            return AppResponse::text(404, "Not found");
        }

        match self.transform(path).await {
            Ok(response) => response,
            Err(e) => AppResponse::from_error(&e),
        }
    }

    async fn transform(&self, path: &str) -> Result<AppResponse, PipelineError> {
        let metrics = PipelineMetrics::global();

        let _permit = match self.request_semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(path, "Concurrency limit reached, rejecting request");
                metrics.record_request(PipelineError::Overloaded.outcome());
                return Err(PipelineError::Overloaded);
            }
        };

        let resolved = match tokio::time::timeout(self.request_timeout, self.pipeline.resolve(path))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                let err = PipelineError::TimedOut {
                    secs: self.request_timeout.as_secs(),
                };
                tracing::error!(path, error = %err, "Request timed out");
                metrics.record_request(err.outcome());
                return Err(err);
            }
        };

        Ok(AppResponse {
            status: 200,
            content_type: resolved.content_type,
            headers: vec![
                (X_CACHE, resolved.cache_status.as_header().to_string()),
                (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL.to_string()),
            ],
            body: resolved.body,
        })
    }
}

#[async_trait]
impl ServeHttp for KagamiApp {
    async fn response(&self, session: &mut ServerSession) -> Response<Vec<u8>> {
        let started = Instant::now();
        let method = session.req_header().method.clone();
        let path = session.req_header().uri.path().to_string();

        let response = self.handle(&method, &path).await;

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status,
            cache = response.header("x-cache").unwrap_or("-"),
            bytes = response.body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        response.into_http(method == Method::HEAD)
    }
}
