//! Request pipeline
//!
//! Every outgoing call flows through here: await the host's throttle gate,
//! attach the bearer token (unless the target is an absolute upload-session
//! URL, which the server requires unsigned), dispatch with the applicable
//! timeout, feed `Retry-After` back into the gate, and classify the response
//! into the adapter's small error taxonomy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backend_traits::auth::TokenProvider;
use backend_traits::http::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Timeouts;
use crate::error::{GraphError, Result};
use crate::throttle::gate_for_url;
use crate::types::UploadStatus;

/// Cap on the server-body excerpt carried inside transport errors
const SNIPPET_LIMIT: usize = 512;

/// Whether a request is stamped with a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Bearer,
    Unsigned,
}

/// Shared request pipeline for one backend instance.
pub struct RequestPipeline {
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    timeouts: Timeouts,
}

impl RequestPipeline {
    pub fn new(http: Arc<dyn HttpClient>, tokens: Arc<dyn TokenProvider>, timeouts: Timeouts) -> Self {
        Self {
            http,
            tokens,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    async fn dispatch(
        &self,
        request: HttpRequest,
        sign: Sign,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let gate = gate_for_url(&request.url);
        cancellable(cancel, gate.wait()).await?;

        let request = self.signed(request, sign).await?;

        debug!(method = request.method.as_str(), url = %request.url, "Dispatching request");
        let response = cancellable(cancel, self.http.execute(request)).await??;

        if let Some(value) = response.header("Retry-After") {
            gate.observe(value);
        }

        Ok(response)
    }

    async fn signed(&self, request: HttpRequest, sign: Sign) -> Result<HttpRequest> {
        match sign {
            Sign::Bearer => {
                let token = self
                    .tokens
                    .access_token()
                    .await
                    .map_err(|e| GraphError::Auth(e.to_string()))?;
                Ok(request.bearer_token(token))
            }
            Sign::Unsigned => Ok(request),
        }
    }

    /// 2xx passes through; 404 becomes `NotFound`; anything else becomes a
    /// `Transport` error carrying status, reason and a body excerpt.
    fn expect_success(response: HttpResponse) -> Result<HttpResponse> {
        if response.is_success() {
            Ok(response)
        } else if response.status == 404 {
            Err(GraphError::NotFound)
        } else {
            Err(transport_error(&response))
        }
    }

    fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
        if response.body.is_empty() {
            return Err(GraphError::Parse("response body was empty".to_string()));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| GraphError::Parse(format!("JSON deserialization failed: {}", e)))
    }

    /// Signed GET returning a parsed JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(timeout);
        let response = Self::expect_success(self.dispatch(request, Sign::Bearer, cancel).await?)?;
        Self::parse_json(&response)
    }

    /// Signed POST with a JSON body, returning a parsed JSON body.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(body)
            .map_err(GraphError::from)?
            .timeout(timeout);
        let response = Self::expect_success(self.dispatch(request, Sign::Bearer, cancel).await?)?;
        Self::parse_json(&response)
    }

    /// Signed PATCH with a JSON body; the response body is not consumed.
    pub async fn patch_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Patch, url)
            .json(body)
            .map_err(GraphError::from)?
            .timeout(timeout);
        Self::expect_success(self.dispatch(request, Sign::Bearer, cancel).await?)?;
        Ok(())
    }

    /// Signed DELETE.
    pub async fn delete(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Delete, url).timeout(timeout);
        Self::expect_success(self.dispatch(request, Sign::Bearer, cancel).await?)?;
        Ok(())
    }

    /// Signed single-request content PUT (the ≤ 4 MB path).
    ///
    /// The caller has already drained the source through the idle-read
    /// decorator; no wall-clock deadline is applied here.
    pub async fn put_content<T: DeserializeOwned>(
        &self,
        url: &str,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Put, url)
            .header("Content-Type", "application/octet-stream")
            .body(body);
        let response = Self::expect_success(self.dispatch(request, Sign::Bearer, cancel).await?)?;
        Self::parse_json(&response)
    }

    /// Signed GET whose body is handed back as a stream as soon as headers
    /// arrive.
    pub async fn get_stream(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<StreamingResponse> {
        let gate = gate_for_url(url);
        cancellable(cancel, gate.wait()).await?;

        let request = self
            .signed(HttpRequest::new(HttpMethod::Get, url), Sign::Bearer)
            .await?;

        debug!(url = %request.url, "Dispatching streamed request");
        let mut response = cancellable(cancel, self.http.execute_stream(request)).await??;

        if let Some(value) = response.header("Retry-After") {
            gate.observe(value);
        }

        if response.is_success() {
            return Ok(response);
        }

        if response.status == 404 {
            return Err(GraphError::NotFound);
        }

        // Pull a bounded excerpt of the error body for diagnostics.
        let mut excerpt = Vec::new();
        let _ = tokio::time::timeout(
            self.timeouts.short,
            (&mut response.body).take(SNIPPET_LIMIT as u64).read_to_end(&mut excerpt),
        )
        .await;

        Err(GraphError::Transport {
            status: response.status,
            reason: response.reason.clone(),
            body: snippet(&excerpt),
        })
    }

    /// UNSIGNED fragment PUT against an absolute upload-session URL.
    ///
    /// Fragment classification differs from control calls: every non-2xx,
    /// 404 included, surfaces as `Transport` so the retry loop can branch on
    /// the raw status.
    pub async fn put_fragment(
        &self,
        upload_url: &str,
        body: Bytes,
        offset: u64,
        total: u64,
        cancel: &CancellationToken,
    ) -> Result<UploadStatus> {
        let len = body.len() as u64;
        debug_assert!(len > 0, "empty fragment");

        let request = HttpRequest::new(HttpMethod::Put, upload_url)
            .header("Content-Length", len.to_string())
            .header(
                "Content-Range",
                format!("bytes {}-{}/{}", offset, offset + len - 1, total),
            )
            .body(body);

        let response = self.dispatch(request, Sign::Unsigned, cancel).await?;
        if !response.is_success() {
            return Err(transport_error(&response));
        }
        Self::parse_json(&response)
    }

    /// UNSIGNED DELETE of an upload-session URL.
    pub async fn delete_unsigned(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Delete, url).timeout(timeout);
        let response = self.dispatch(request, Sign::Unsigned, cancel).await?;
        if !response.is_success() {
            return Err(transport_error(&response));
        }
        Ok(())
    }
}

fn transport_error(response: &HttpResponse) -> GraphError {
    GraphError::Transport {
        status: response.status,
        reason: response.reason.clone(),
        body: snippet(&response.body),
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(SNIPPET_LIMIT) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.into_owned(),
    }
}

/// Race a future against cooperative cancellation.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GraphError::Cancelled),
        out = fut => Ok(out),
    }
}
