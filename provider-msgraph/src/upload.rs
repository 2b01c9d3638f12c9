//! Chunked upload engine
//!
//! Large files go up through a server-issued upload session: the source
//! stream is fragmented into aligned pieces and PUT sequentially against the
//! session URL, each with a `Content-Range` header and without an
//! `Authorization` header. Fragments retry individually (5xx with
//! exponential backoff, 408/409/429 immediately) and every abort path
//! cancels the session server-side before surfacing the failure.

use std::io::{self, SeekFrom};
use std::time::Duration;

use backend_traits::storage::SourceStream;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MsGraphConfig;
use crate::error::{GraphError, Result};
use crate::io::{BoundedReader, IdleTimeoutReader};
use crate::pipeline::{cancellable, RequestPipeline};
use crate::throttle::gate_for_url;
use crate::types::UploadSession;

/// Fragments must be sized in multiples of 320 KiB
pub const FRAGMENT_ALIGNMENT: u64 = 320 * 1024;

/// Smallest permitted fragment
pub const MIN_FRAGMENT_SIZE: u64 = FRAGMENT_ALIGNMENT;

/// Largest permitted fragment (60 MiB)
pub const MAX_FRAGMENT_SIZE: u64 = 60 * 1024 * 1024;

/// Default fragment size (10 MiB)
pub const DEFAULT_FRAGMENT_SIZE: u64 = 10 * 1024 * 1024;

/// Payloads at or below this many bytes use the single-PUT path
pub const SINGLE_PUT_CEILING: u64 = 4_000_000;

/// Clamp a requested fragment size into [320 KiB, 60 MiB] and round it down
/// to a multiple of 320 KiB.
pub(crate) fn align_fragment_size(requested: u64) -> u64 {
    let clamped = requested.clamp(MIN_FRAGMENT_SIZE, MAX_FRAGMENT_SIZE);
    clamped - clamped % FRAGMENT_ALIGNMENT
}

/// How a failed fragment attempt proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentFailure {
    /// 5xx: retry after exponential backoff
    RetryBackoff,
    /// 408/409/429: retry immediately, the throttle gate already paces us
    RetryImmediate,
    /// Everything else, 404 and non-HTTP failures included: cancel the
    /// session and surface the error
    Fatal,
}

fn classify_failure(error: &GraphError) -> FragmentFailure {
    match error {
        GraphError::Transport { status, .. } => match *status {
            500..=599 => FragmentFailure::RetryBackoff,
            408 | 409 | 429 => FragmentFailure::RetryImmediate,
            _ => FragmentFailure::Fatal,
        },
        _ => FragmentFailure::Fatal,
    }
}

/// Drives one file through an upload session.
pub struct ChunkedUploader<'a> {
    pipeline: &'a RequestPipeline,
    fragment_size: u64,
    retry_count: u32,
    retry_delay: Duration,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(pipeline: &'a RequestPipeline, config: &MsGraphConfig) -> Self {
        Self {
            pipeline,
            fragment_size: align_fragment_size(config.fragment_size),
            retry_count: config.fragment_retry_count.max(1),
            retry_delay: config.fragment_retry_delay,
        }
    }

    /// Upload `length` bytes from `source` through a session created at
    /// `session_url`.
    ///
    /// Session creation failures propagate as-is; once the session exists,
    /// every abort path other than caller cancellation DELETEs it first.
    pub async fn upload(
        &self,
        session_url: &str,
        source: &mut dyn SourceStream,
        length: u64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let session: UploadSession = self
            .pipeline
            .post_json(
                session_url,
                &serde_json::json!({}),
                self.pipeline.timeouts().short,
                cancel,
            )
            .await?;
        let upload_url = session
            .upload_url
            .ok_or_else(|| GraphError::Parse("upload session without an uploadUrl".to_string()))?;

        let buffer_size = self.fragment_size.min(length);
        let fragment_count = length.div_ceil(buffer_size);
        info!(length, buffer_size, fragment_count, "Starting chunked upload");

        let mut offset = 0u64;
        let mut index = 0u64;
        while offset < length {
            let current = buffer_size.min(length - offset);
            self.upload_fragment(
                &upload_url,
                source,
                offset,
                current,
                length,
                index,
                fragment_count,
                cancel,
            )
            .await?;
            offset += current;
            index += 1;
        }

        debug!("Chunked upload complete");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_fragment(
        &self,
        upload_url: &str,
        source: &mut dyn SourceStream,
        offset: u64,
        current: u64,
        total: u64,
        index: u64,
        count: u64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for attempt in 0..self.retry_count {
            let error = match self
                .attempt_fragment(upload_url, source, offset, current, total, cancel)
                .await
            {
                Ok(()) => {
                    if attempt > 0 {
                        info!(fragment = index, attempt, "Fragment succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            // Caller cancellation leaves the session alive so a resume at
            // the file level stays possible.
            if matches!(error, GraphError::Cancelled) {
                return Err(error);
            }

            let exhausted = attempt + 1 >= self.retry_count;
            match classify_failure(&error) {
                FragmentFailure::RetryBackoff if !exhausted => {
                    let backoff = self
                        .retry_delay
                        .saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX));
                    warn!(
                        fragment = index,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "Fragment failed, backing off"
                    );

                    // Honor the throttle gate when its deadline is later
                    // than the computed backoff.
                    let deadline =
                        (Instant::now() + backoff).max(gate_for_url(upload_url).next_open());
                    cancellable(cancel, tokio::time::sleep_until(deadline)).await?;
                }
                FragmentFailure::RetryImmediate if !exhausted => {
                    warn!(fragment = index, attempt, error = %error, "Fragment failed, retrying");
                }
                _ => {
                    self.cancel_session(upload_url, cancel).await;
                    return Err(GraphError::UploadSession {
                        fragment_index: index,
                        fragment_count: count,
                        cause: Box::new(error),
                    });
                }
            }
        }

        unreachable!("fragment retry loop returns on its final attempt")
    }

    async fn attempt_fragment(
        &self,
        upload_url: &str,
        source: &mut dyn SourceStream,
        offset: u64,
        current: u64,
        total: u64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Reposition unconditionally: a prior attempt may have consumed any
        // number of bytes from the window.
        source.seek(SeekFrom::Start(offset)).await?;

        let mut window = BoundedReader::new(source, current);
        let mut guarded =
            IdleTimeoutReader::new(&mut window, self.pipeline.timeouts().read_write);

        let mut buf = Vec::with_capacity(current as usize);
        cancellable(cancel, guarded.read_to_end(&mut buf)).await??;

        if buf.len() as u64 != current {
            return Err(GraphError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended at {} of {} fragment bytes", buf.len(), current),
            )));
        }

        let status = self
            .pipeline
            .put_fragment(upload_url, Bytes::from(buf), offset, total, cancel)
            .await?;
        debug!(offset, len = current, ranges = ?status.next_expected_ranges, "Fragment accepted");
        Ok(())
    }

    async fn cancel_session(&self, upload_url: &str, cancel: &CancellationToken) {
        info!("Cancelling upload session");
        if let Err(error) = self
            .pipeline
            .delete_unsigned(upload_url, self.pipeline.timeouts().short, cancel)
            .await
        {
            warn!(error = %error, "Failed to cancel upload session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_response, pipeline_with, MockHttpClient};
    use backend_traits::http::HttpMethod;
    use std::io::Cursor;

    const SESSION_URL: &str =
        "https://upload-unit.test.example/v1.0/me/drive/root:/backup/big.bin:/createUploadSession";
    const UPLOAD_URL: &str = "https://upload-unit-session.test.example/session/1";

    fn config(fragment_size: u64, retry_count: u32) -> MsGraphConfig {
        MsGraphConfig::builder("msgraph://backup")
            .auth_id("cred")
            .fragment_size(fragment_size)
            .fragment_retry_count(retry_count)
            .fragment_retry_delay(Duration::from_millis(100))
            .build()
            .unwrap()
    }

    fn expect_session_create(http: &mut MockHttpClient) {
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Post
                    && req.url == SESSION_URL
                    && req.body.as_deref() == Some(b"{}".as_slice())
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    &format!(r#"{{"uploadUrl": "{}", "nextExpectedRanges": ["0-"]}}"#, UPLOAD_URL),
                ))
            });
    }

    #[test]
    fn test_align_fragment_size() {
        assert_eq!(align_fragment_size(100), MIN_FRAGMENT_SIZE);
        assert_eq!(align_fragment_size(1_000_000_000), MAX_FRAGMENT_SIZE);
        assert_eq!(align_fragment_size(DEFAULT_FRAGMENT_SIZE), DEFAULT_FRAGMENT_SIZE);
        assert_eq!(
            align_fragment_size(MIN_FRAGMENT_SIZE + 1),
            MIN_FRAGMENT_SIZE
        );
        assert_eq!(align_fragment_size(MAX_FRAGMENT_SIZE), MAX_FRAGMENT_SIZE);

        for requested in [100, 500_000, 1_000_000, 50_000_000, u64::MAX] {
            let effective = align_fragment_size(requested);
            assert!(effective >= MIN_FRAGMENT_SIZE);
            assert!(effective <= MAX_FRAGMENT_SIZE);
            assert_eq!(effective % FRAGMENT_ALIGNMENT, 0);
            if requested >= MIN_FRAGMENT_SIZE {
                assert!(effective <= requested);
            }
        }
    }

    #[test]
    fn test_classify_failure() {
        let transport = |status| GraphError::Transport {
            status,
            reason: String::new(),
            body: String::new(),
        };

        assert_eq!(classify_failure(&transport(500)), FragmentFailure::RetryBackoff);
        assert_eq!(classify_failure(&transport(503)), FragmentFailure::RetryBackoff);
        assert_eq!(classify_failure(&transport(408)), FragmentFailure::RetryImmediate);
        assert_eq!(classify_failure(&transport(409)), FragmentFailure::RetryImmediate);
        assert_eq!(classify_failure(&transport(429)), FragmentFailure::RetryImmediate);
        assert_eq!(classify_failure(&transport(404)), FragmentFailure::Fatal);
        assert_eq!(classify_failure(&transport(400)), FragmentFailure::Fatal);
        assert_eq!(
            classify_failure(&GraphError::Io(io::Error::other("net"))),
            FragmentFailure::Fatal
        );
    }

    #[tokio::test]
    async fn test_single_fragment_covers_whole_stream() {
        let mut http = MockHttpClient::new();
        expect_session_create(&mut http);

        // Stream length == fragment size: one fragment covering everything.
        let length = MIN_FRAGMENT_SIZE;
        http.expect_execute()
            .withf(move |req| {
                req.method == HttpMethod::Put
                    && req.url == UPLOAD_URL
                    && req.headers.get("Content-Range")
                        == Some(&format!("bytes 0-{}/{}", length - 1, length))
                    && !req.headers.contains_key("Authorization")
            })
            .times(1)
            .returning(|_| Ok(json_response(201, r#"{"id": "done", "size": 327680}"#)));

        let pipeline = pipeline_with(http);
        let uploader = ChunkedUploader::new(&pipeline, &config(MIN_FRAGMENT_SIZE, 5));

        let mut source = Cursor::new(vec![0x41u8; length as usize]);
        uploader
            .upload(SESSION_URL, &mut source, length, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_503_retries_resend_same_bytes() {
        let mut http = MockHttpClient::new();
        expect_session_create(&mut http);

        let length = MIN_FRAGMENT_SIZE + 10;

        // First fragment succeeds.
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.headers.get("Content-Range").map(|r| r.starts_with("bytes 0-"))
                        == Some(true)
            })
            .times(1)
            .returning(|_| Ok(json_response(202, r#"{"nextExpectedRanges": ["327680-"]}"#)));

        // Second fragment: one 503, then success. Both attempts must carry
        // the same 10 trailing bytes, proving the seek-back re-read.
        let expect_tail = move |req: &backend_traits::http::HttpRequest| {
            req.method == HttpMethod::Put
                && req.headers.get("Content-Range")
                    == Some(&format!(
                        "bytes {}-{}/{}",
                        MIN_FRAGMENT_SIZE,
                        length - 1,
                        length
                    ))
                && req.body.as_deref() == Some(vec![0x42u8; 10].as_slice())
        };

        http.expect_execute()
            .withf(expect_tail)
            .times(1)
            .returning(|_| Ok(json_response(503, "busy")));
        http.expect_execute()
            .withf(expect_tail)
            .times(1)
            .returning(|_| Ok(json_response(201, r#"{"id": "done"}"#)));

        let pipeline = pipeline_with(http);
        let uploader = ChunkedUploader::new(&pipeline, &config(MIN_FRAGMENT_SIZE, 5));

        let mut bytes = vec![0x41u8; MIN_FRAGMENT_SIZE as usize];
        bytes.extend_from_slice(&[0x42u8; 10]);
        let mut source = Cursor::new(bytes);

        let before = Instant::now();
        uploader
            .upload(SESSION_URL, &mut source, length, &CancellationToken::new())
            .await
            .unwrap();

        // First retry backs off by at least the base delay.
        assert!(Instant::now() - before >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_404_cancels_session_and_raises() {
        let mut http = MockHttpClient::new();
        expect_session_create(&mut http);

        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Put && req.url == UPLOAD_URL)
            .times(1)
            .returning(|_| Ok(json_response(404, "session expired")));

        // The abort path DELETEs the session, unsigned.
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Delete
                    && req.url == UPLOAD_URL
                    && !req.headers.contains_key("Authorization")
            })
            .times(1)
            .returning(|_| Ok(json_response(204, "")));

        let pipeline = pipeline_with(http);
        let uploader = ChunkedUploader::new(&pipeline, &config(MIN_FRAGMENT_SIZE, 5));

        let mut source = Cursor::new(vec![0u8; MIN_FRAGMENT_SIZE as usize]);
        let result = uploader
            .upload(
                SESSION_URL,
                &mut source,
                MIN_FRAGMENT_SIZE,
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(GraphError::UploadSession {
                fragment_index,
                fragment_count,
                cause,
            }) => {
                assert_eq!(fragment_index, 0);
                assert_eq!(fragment_count, 1);
                assert!(matches!(*cause, GraphError::Transport { status: 404, .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_cancels_session() {
        let mut http = MockHttpClient::new();
        expect_session_create(&mut http);

        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Put && req.url == UPLOAD_URL)
            .times(3)
            .returning(|_| Ok(json_response(500, "still broken")));

        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Delete && req.url == UPLOAD_URL)
            .times(1)
            .returning(|_| Ok(json_response(204, "")));

        let pipeline = pipeline_with(http);
        let uploader = ChunkedUploader::new(&pipeline, &config(MIN_FRAGMENT_SIZE, 3));

        let mut source = Cursor::new(vec![0u8; MIN_FRAGMENT_SIZE as usize]);
        let result = uploader
            .upload(
                SESSION_URL,
                &mut source,
                MIN_FRAGMENT_SIZE,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(GraphError::UploadSession { fragment_index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_session_create_failure_propagates_without_cleanup() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| req.method == HttpMethod::Post)
            .times(1)
            .returning(|_| Ok(json_response(403, "forbidden")));

        let pipeline = pipeline_with(http);
        let uploader = ChunkedUploader::new(&pipeline, &config(MIN_FRAGMENT_SIZE, 5));

        let mut source = Cursor::new(vec![0u8; 16]);
        let result = uploader
            .upload(SESSION_URL, &mut source, 16, &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(GraphError::Transport { status: 403, .. })
        ));
    }
}
