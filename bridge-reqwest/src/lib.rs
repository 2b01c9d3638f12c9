//! # Reqwest Transport Bridge
//!
//! Concrete [`HttpClient`](backend_traits::http::HttpClient) implementation
//! built on `reqwest`, providing connection pooling, TLS and per-request
//! timeouts. Retry policy deliberately lives above this crate.

pub mod http;

pub use http::ReqwestHttpClient;
