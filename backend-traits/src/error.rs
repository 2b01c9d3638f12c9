use thiserror::Error;

/// Errors surfaced to the backup engine by storage backends and their
/// collaborators.
///
/// The `FileMissing`/`FolderMissing` pair is the contextual translation of a
/// remote 404: operations targeting a specific file report `FileMissing`,
/// operations targeting the backup root report `FolderMissing`.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Remote file not found")]
    FileMissing,

    #[error("Remote folder not found")]
    FolderMissing,

    #[error("Transport error (status {status} {reason}): {detail}")]
    Transport {
        status: u16,
        reason: String,
        detail: String,
    },

    #[error("Failed to parse server response: {0}")]
    Parse(String),

    #[error("Upload session aborted at fragment {fragment_index} of {fragment_count}: {source}")]
    UploadAborted {
        fragment_index: u64,
        fragment_count: u64,
        #[source]
        source: Box<BackendError>,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;
