//! Storage backend surface.
//!
//! The uniform file-oriented interface a backup engine drives: list, put,
//! get, rename, delete, create-folder, quota, test. Adapters translate these
//! into whatever wire protocol the remote speaks.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A remote file or folder as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Backend-assigned identifier
    pub id: String,

    /// Entry name (no path component)
    pub name: String,

    /// Size in bytes; folders report zero
    pub size: u64,

    /// Whether the entry is a regular file
    pub is_file: bool,

    /// Whether the server reports the entry as deleted
    pub is_deleted: bool,

    /// Last access timestamp (RFC 3339), when the server reports one
    pub accessed_at: Option<String>,

    /// Last modification timestamp (RFC 3339), when the server reports one
    pub modified_at: Option<String>,
}

/// Space accounting for a remote drive.
///
/// `None` fields mean the server did not report a usable value; some drives
/// misreport all-zero quotas and are treated as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageQuota {
    pub total: Option<u64>,
    pub remaining: Option<u64>,
}

/// Upload source: a length-known, seekable byte stream.
///
/// Seekability is what makes in-place fragment retry possible; a source that
/// cannot rewind forces the caller to restart the whole file.
pub trait SourceStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SourceStream for T {}

/// Download sink for streamed gets.
pub type SinkStream = dyn AsyncWrite + Send + Unpin;

/// Uniform remote-storage interface.
///
/// Every operation takes a [`CancellationToken`]; cancellation aborts at the
/// nearest I/O point and propagates as [`BackendError::Cancelled`]. Multiple
/// operations may run concurrently against one backend instance.
///
/// [`BackendError::Cancelled`]: crate::error::BackendError::Cancelled
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Enumerate the entries directly under the backup root.
    async fn list(&self, cancel: CancellationToken) -> Result<Vec<RemoteEntry>>;

    /// Stream the named file's content into `sink`.
    async fn get(
        &self,
        name: &str,
        sink: &mut SinkStream,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Upload `length` bytes from `source` as the named file.
    ///
    /// Small payloads go up in a single request; larger ones through a
    /// resumable fragment session.
    async fn put(
        &self,
        name: &str,
        source: &mut dyn SourceStream,
        length: u64,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Delete the named file.
    async fn delete(&self, name: &str, cancel: CancellationToken) -> Result<()>;

    /// Rename the file `name` to `new_name` in place.
    async fn rename(&self, name: &str, new_name: &str, cancel: CancellationToken) -> Result<()>;

    /// Create the backup root folder path, one missing segment at a time.
    async fn create_folder(&self, cancel: CancellationToken) -> Result<()>;

    /// Report drive space accounting.
    async fn quota(&self, cancel: CancellationToken) -> Result<StorageQuota>;

    /// Verify the backend is reachable and credentials allow read and write.
    async fn test(&self, cancel: CancellationToken) -> Result<()>;
}
