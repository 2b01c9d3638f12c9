//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use backend_traits::auth::StaticTokenProvider;
use backend_traits::error::Result as BackendResult;
use backend_traits::http::{HttpClient, HttpRequest, HttpResponse, StreamingResponse};
use bytes::Bytes;
use mockall::mock;

use crate::config::Timeouts;
use crate::pipeline::RequestPipeline;

mock! {
    pub HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BackendResult<HttpResponse>;
        async fn execute_stream(&self, request: HttpRequest) -> BackendResult<StreamingResponse>;
    }
}

pub fn reason_for(status: u16) -> String {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        408 => "Request Timeout",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
    .to_string()
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        reason: reason_for(status),
        headers: HashMap::new(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

pub fn stream_response(status: u16, body: &[u8]) -> StreamingResponse {
    StreamingResponse {
        status,
        reason: reason_for(status),
        headers: HashMap::new(),
        body: Box::new(std::io::Cursor::new(body.to_vec())),
    }
}

pub fn pipeline_with(http: MockHttpClient) -> RequestPipeline {
    RequestPipeline::new(
        Arc::new(http),
        Arc::new(StaticTokenProvider::new("test-token")),
        Timeouts::default(),
    )
}
