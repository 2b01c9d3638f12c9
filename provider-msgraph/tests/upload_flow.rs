//! End-to-end upload, throttling and pagination flows against a scripted
//! mock transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backend_traits::auth::StaticTokenProvider;
use backend_traits::error::{BackendError, Result as BackendResult};
use backend_traits::http::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse,
};
use backend_traits::storage::StorageBackend;
use bytes::Bytes;
use mockall::mock;
use provider_msgraph::{MsGraphBackend, MsGraphConfig};
use tokio_util::sync::CancellationToken;

mock! {
    pub HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BackendResult<HttpResponse>;
        async fn execute_stream(&self, request: HttpRequest) -> BackendResult<StreamingResponse>;
    }
}

fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        reason: match status {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            404 => "Not Found",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
        .to_string(),
        headers: HashMap::new(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

fn backend_with(http: MockHttpClient, fragment_size: u64) -> MsGraphBackend {
    let config = MsGraphConfig::builder("msgraph://backup")
        .auth_id("cred")
        .fragment_size(fragment_size)
        .build()
        .unwrap();
    MsGraphBackend::new(
        config,
        Arc::new(http),
        Arc::new(StaticTokenProvider::new("integration-token")),
    )
}

fn expect_session_create(http: &mut MockHttpClient, name: &str, upload_url: &str) {
    let suffix = format!("/root:/backup/{}:/createUploadSession", name);
    let body = format!(r#"{{"uploadUrl": "{}", "nextExpectedRanges": ["0-"]}}"#, upload_url);
    http.expect_execute()
        .withf(move |req| {
            req.method == HttpMethod::Post
                && req.url.ends_with(&suffix)
                && req.body.as_deref() == Some(b"{}".as_slice())
                && req.headers.get("Content-Type") == Some(&"application/json".to_string())
        })
        .times(1)
        .returning(move |_| Ok(json_response(200, &body)));
}

fn is_fragment(req: &HttpRequest, upload_url: &str, range: &str) -> bool {
    req.method == HttpMethod::Put
        && req.url == upload_url
        && req.headers.get("Content-Range") == Some(&range.to_string())
        && !req.headers.contains_key("Authorization")
}

#[tokio::test]
async fn small_upload_uses_one_signed_put() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| {
            req.method == HttpMethod::Put
                && req.url.ends_with("/root:/backup/a.bin:/content")
                && req.headers.get("Content-Type") == Some(&"application/octet-stream".to_string())
                && req.headers.get("Authorization")
                    == Some(&"Bearer integration-token".to_string())
                && req.body.as_ref().map(|b| b.len()) == Some(256)
        })
        .times(1)
        .returning(|_| {
            Ok(json_response(
                201,
                r#"{"id": "X", "name": "a.bin", "size": 256, "file": {}}"#,
            ))
        });

    let backend = backend_with(http, 5 * 1024 * 1024);
    let payload: Vec<u8> = (0..=255u8).collect();
    let mut source = std::io::Cursor::new(payload);

    backend
        .put("a.bin", &mut source, 256, CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn chunked_upload_covers_stream_with_aligned_unsigned_fragments() {
    const UPLOAD_URL: &str = "https://flow-chunked.test.example/session/1";
    let length: u64 = 12 * 1024 * 1024;

    let mut http = MockHttpClient::new();
    expect_session_create(&mut http, "big.bin", UPLOAD_URL);

    let fragments = [
        ("bytes 0-5242879/12582912", 5_242_880usize),
        ("bytes 5242880-10485759/12582912", 5_242_880),
        ("bytes 10485760-12582911/12582912", 2_097_152),
    ];
    for (i, (range, len)) in fragments.into_iter().enumerate() {
        let last = i == fragments.len() - 1;
        http.expect_execute()
            .withf(move |req| {
                is_fragment(req, UPLOAD_URL, range)
                    && req.headers.get("Content-Length") == Some(&len.to_string())
                    && req.body.as_ref().map(|b| b.len()) == Some(len)
                    && req.body.as_ref().is_some_and(|b| b.iter().all(|&x| x == b'A'))
            })
            .times(1)
            .returning(move |_| {
                if last {
                    Ok(json_response(
                        201,
                        r#"{"id": "X", "name": "big.bin", "size": 12582912, "file": {}}"#,
                    ))
                } else {
                    Ok(json_response(202, r#"{"nextExpectedRanges": ["next-"]}"#))
                }
            });
    }

    let backend = backend_with(http, 5 * 1024 * 1024);
    let mut source = std::io::Cursor::new(vec![b'A'; length as usize]);

    backend
        .put("big.bin", &mut source, length, CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn one_byte_over_the_ceiling_switches_to_two_fragments() {
    const UPLOAD_URL: &str = "https://flow-boundary.test.example/session/1";
    // 12 × 320 KiB, so the 4,000,001-byte stream needs a second, small
    // fragment.
    let fragment_size: u64 = 3_932_160;
    let length: u64 = 4_000_001;

    let mut http = MockHttpClient::new();
    expect_session_create(&mut http, "edge.bin", UPLOAD_URL);

    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 0-3932159/4000001"))
        .times(1)
        .returning(|_| Ok(json_response(202, r#"{"nextExpectedRanges": ["3932160-"]}"#)));
    http.expect_execute()
        .withf(move |req| {
            is_fragment(req, UPLOAD_URL, "bytes 3932160-4000000/4000001")
                && req.body.as_ref().map(|b| b.len()) == Some(67_841)
        })
        .times(1)
        .returning(|_| Ok(json_response(201, r#"{"id": "X", "size": 4000001}"#)));

    let backend = backend_with(http, fragment_size);
    let mut source = std::io::Cursor::new(vec![0u8; length as usize]);

    backend
        .put("edge.bin", &mut source, length, CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn transient_503_retries_after_backoff_with_rewound_stream() {
    const UPLOAD_URL: &str = "https://flow-retry.test.example/session/1";
    let fragment_size: u64 = 320 * 1024;
    let length = fragment_size * 3;

    let mut http = MockHttpClient::new();
    expect_session_create(&mut http, "retry.bin", UPLOAD_URL);

    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 0-327679/983040"))
        .times(1)
        .returning(|_| Ok(json_response(202, "{}")));

    // Second fragment fails once with 503, then succeeds. Both attempts
    // must carry the same bytes: the source was rewound to the fragment
    // offset in between.
    let tail_attempt = move |req: &HttpRequest| {
        is_fragment(req, UPLOAD_URL, "bytes 327680-655359/983040")
            && req
                .body
                .as_ref()
                .is_some_and(|b| b.len() == fragment_size as usize && b.iter().all(|&x| x == b'B'))
    };
    http.expect_execute()
        .withf(tail_attempt)
        .times(1)
        .returning(|_| Ok(json_response(503, "busy")));
    http.expect_execute()
        .withf(tail_attempt)
        .times(1)
        .returning(|_| Ok(json_response(202, "{}")));

    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 655360-983039/983040"))
        .times(1)
        .returning(|_| Ok(json_response(201, r#"{"id": "X"}"#)));

    let backend = backend_with(http, fragment_size);
    let mut bytes = vec![b'A'; fragment_size as usize];
    bytes.extend_from_slice(&vec![b'B'; fragment_size as usize]);
    bytes.extend_from_slice(&vec![b'C'; fragment_size as usize]);
    let mut source = std::io::Cursor::new(bytes);

    let before = tokio::time::Instant::now();
    backend
        .put("retry.bin", &mut source, length, CancellationToken::new())
        .await
        .unwrap();

    // The first retry waits at least the base fragment retry delay.
    assert!(tokio::time::Instant::now() - before >= Duration::from_millis(1000));
}

#[tokio::test]
async fn lost_session_is_cancelled_and_reported() {
    const UPLOAD_URL: &str = "https://flow-lost.test.example/session/1";
    let fragment_size: u64 = 320 * 1024;
    let length = fragment_size * 3;

    let mut http = MockHttpClient::new();
    expect_session_create(&mut http, "lost.bin", UPLOAD_URL);

    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 0-327679/983040"))
        .times(1)
        .returning(|_| Ok(json_response(202, "{}")));
    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 327680-655359/983040"))
        .times(1)
        .returning(|_| Ok(json_response(404, "session expired")));

    // Exactly one unsigned DELETE against the session URL.
    http.expect_execute()
        .withf(move |req| {
            req.method == HttpMethod::Delete
                && req.url == UPLOAD_URL
                && !req.headers.contains_key("Authorization")
        })
        .times(1)
        .returning(|_| Ok(json_response(204, "")));

    let backend = backend_with(http, fragment_size);
    let mut source = std::io::Cursor::new(vec![0u8; length as usize]);

    let result = backend
        .put("lost.bin", &mut source, length, CancellationToken::new())
        .await;

    match result {
        Err(BackendError::UploadAborted {
            fragment_index,
            fragment_count,
            source,
        }) => {
            assert_eq!(fragment_index, 1);
            assert_eq!(fragment_count, 3);
            assert!(matches!(
                *source,
                BackendError::Transport { status: 404, .. }
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn retry_after_header_delays_next_request_to_same_host() {
    const UPLOAD_URL: &str = "https://flow-throttle.test.example/session/1";
    let fragment_size: u64 = 320 * 1024;
    let length = fragment_size * 2;

    let mut http = MockHttpClient::new();
    expect_session_create(&mut http, "slow.bin", UPLOAD_URL);

    // First fragment succeeds but asks for a 2 second pause.
    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 0-327679/655360"))
        .times(1)
        .returning(|_| {
            let mut response = json_response(202, "{}");
            response
                .headers
                .insert("Retry-After".to_string(), "2".to_string());
            Ok(response)
        });

    http.expect_execute()
        .withf(move |req| is_fragment(req, UPLOAD_URL, "bytes 327680-655359/655360"))
        .times(1)
        .returning(|_| Ok(json_response(201, r#"{"id": "X"}"#)));

    let backend = backend_with(http, fragment_size);
    let mut source = std::io::Cursor::new(vec![0u8; length as usize]);

    let before = tokio::time::Instant::now();
    backend
        .put("slow.bin", &mut source, length, CancellationToken::new())
        .await
        .unwrap();

    assert!(tokio::time::Instant::now() - before >= Duration::from_secs(2));
}

#[tokio::test]
async fn list_pagination_preserves_order_across_pages() {
    let mut http = MockHttpClient::new();

    http.expect_execute()
        .withf(|req| req.url.ends_with("/root:/backup:/children"))
        .times(1)
        .returning(|_| {
            Ok(json_response(
                200,
                r#"{
                    "value": [
                        {"id": "1", "name": "a", "size": 1, "file": {}},
                        {"id": "2", "name": "b", "size": 2, "file": {}}
                    ],
                    "@odata.nextLink": "https://graph.microsoft.com/v1.0/page2?skiptoken=1"
                }"#,
            ))
        });
    http.expect_execute()
        .withf(|req| req.url.contains("skiptoken=1"))
        .times(1)
        .returning(|_| {
            Ok(json_response(
                200,
                r#"{"value": [{"id": "3", "name": "c", "size": 3, "file": {}}]}"#,
            ))
        });

    let backend = backend_with(http, 5 * 1024 * 1024);
    let entries = backend.list(CancellationToken::new()).await.unwrap();

    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn round_trip_returns_uploaded_bytes() {
    let payload = b"round-trip payload".to_vec();
    let echoed = payload.clone();

    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|req| req.method == HttpMethod::Put && req.url.ends_with("/rt.bin:/content"))
        .times(1)
        .returning(|_| Ok(json_response(201, r#"{"id": "X", "file": {}}"#)));
    http.expect_execute_stream()
        .withf(|req| req.url.ends_with("/rt.bin:/content"))
        .times(1)
        .returning(move |_| {
            Ok(StreamingResponse {
                status: 200,
                reason: "OK".to_string(),
                headers: HashMap::new(),
                body: Box::new(std::io::Cursor::new(echoed.clone())),
            })
        });

    let backend = backend_with(http, 5 * 1024 * 1024);

    let mut source = std::io::Cursor::new(payload.clone());
    backend
        .put("rt.bin", &mut source, payload.len() as u64, CancellationToken::new())
        .await
        .unwrap();

    let mut sink = std::io::Cursor::new(Vec::new());
    backend
        .get("rt.bin", &mut sink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sink.into_inner(), payload);
}
