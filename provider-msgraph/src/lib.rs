//! # Microsoft Graph Provider
//!
//! Implements [`StorageBackend`](backend_traits::storage::StorageBackend) for
//! Microsoft Graph–backed drives (OneDrive personal, business, SharePoint).
//!
//! ## Overview
//!
//! This crate provides:
//! - Resumable chunked uploads via Graph upload sessions
//! - Server-directed throttling (`Retry-After`) with a process-wide,
//!   host-keyed gate
//! - Lazy drive-path resolution and cursor-driven pagination
//! - Streamed downloads with idle-read timeouts
//! - Per-fragment retry with exponential backoff
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use provider_msgraph::{MsGraphBackend, MsGraphConfig};
//!
//! let config = MsGraphConfig::builder("msgraph://backup/photos")
//!     .auth_id("profile-1")
//!     .build()?;
//!
//! let backend = MsGraphBackend::new(config, http_client, token_provider);
//! let entries = backend.list(cancel.clone()).await?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod folders;
pub mod io;
pub mod pager;
pub mod pipeline;
pub mod resolver;
pub mod throttle;
pub mod types;
pub mod upload;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::MsGraphBackend;
pub use config::{MsGraphConfig, MsGraphConfigBuilder, Timeouts};
pub use error::{GraphError, Result};
pub use resolver::DriveAddressing;
