//! # Backend Traits
//!
//! Collaborator traits that storage backends are composed from.
//!
//! ## Overview
//!
//! This crate defines the contract between a backup engine and the remote
//! storage adapters it drives. Each trait represents a capability that a
//! backend needs but that is provided by a different collaborator: the HTTP
//! transport, the token issuer, and the backend surface itself.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations, buffered and streamed
//!
//! ### Credentials
//! - [`TokenProvider`](auth::TokenProvider) - Bearer-token issuing collaborator
//!
//! ### Storage surface
//! - [`StorageBackend`](storage::StorageBackend) - Uniform file-oriented
//!   operations (list, put, get, rename, delete, create-folder, quota, test)
//!
//! ## Error Handling
//!
//! All traits use the [`BackendError`](error::BackendError) type for consistent
//! error handling. Adapter implementations should:
//!
//! - Convert wire-level errors to `BackendError`
//! - Provide actionable error messages
//! - Preserve server diagnostics (status code, reason phrase, body snippet)
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.

pub mod auth;
pub mod error;
pub mod http;
pub mod storage;

pub use error::BackendError;

// Re-export commonly used types
pub use auth::TokenProvider;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse};
pub use storage::{RemoteEntry, SourceStream, StorageBackend, StorageQuota};
