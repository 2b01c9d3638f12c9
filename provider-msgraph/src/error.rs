//! Error types for the Microsoft Graph provider

use backend_traits::error::BackendError;
use thiserror::Error;

/// Internal error taxonomy of the request pipeline and upload engine.
///
/// `NotFound` is the raw 404 condition; the operation layer translates it
/// into the engine-facing `FileMissing`/`FolderMissing` depending on what the
/// request targeted.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The targeted item does not exist (HTTP 404 on a control call)
    #[error("Item not found")]
    NotFound,

    /// Any other non-2xx response
    #[error("Graph API error (status {status} {reason}): {body}")]
    Transport {
        status: u16,
        reason: String,
        body: String,
    },

    /// Body was expected to be JSON of a particular shape but was missing,
    /// truncated, or malformed
    #[error("Failed to parse Graph response: {0}")]
    Parse(String),

    /// Fragmented upload aborted; the session has been cancelled server-side
    /// by the time this is raised
    #[error("Upload session failed at fragment {fragment_index} of {fragment_count}: {cause}")]
    UploadSession {
        fragment_index: u64,
        fragment_count: u64,
        #[source]
        cause: Box<GraphError>,
    },

    /// The token collaborator could not produce a bearer token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Cooperative cancellation by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Underlying network or stream failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    /// Status code for transport-level failures
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Translate `NotFound` into `FolderMissing`; used by operations that
    /// target the backup root rather than a specific file.
    pub(crate) fn into_folder_missing(self) -> BackendError {
        match self {
            GraphError::NotFound => BackendError::FolderMissing,
            other => other.into(),
        }
    }
}

impl From<GraphError> for BackendError {
    fn from(error: GraphError) -> Self {
        match error {
            // Operations on a specific file are the default context
            GraphError::NotFound => BackendError::FileMissing,
            GraphError::Transport {
                status,
                reason,
                body,
            } => BackendError::Transport {
                status,
                reason,
                detail: body,
            },
            GraphError::Parse(msg) => BackendError::Parse(msg),
            GraphError::UploadSession {
                fragment_index,
                fragment_count,
                cause,
            } => BackendError::UploadAborted {
                fragment_index,
                fragment_count,
                source: Box::new((*cause).into()),
            },
            GraphError::Auth(msg) => BackendError::Auth(msg),
            GraphError::Cancelled => BackendError::Cancelled,
            GraphError::Io(e) => BackendError::Io(e),
        }
    }
}

impl From<BackendError> for GraphError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::FileMissing | BackendError::FolderMissing => GraphError::NotFound,
            BackendError::Transport {
                status,
                reason,
                detail,
            } => GraphError::Transport {
                status,
                reason,
                body: detail,
            },
            BackendError::Parse(msg) => GraphError::Parse(msg),
            BackendError::UploadAborted {
                fragment_index,
                fragment_count,
                source,
            } => GraphError::UploadSession {
                fragment_index,
                fragment_count,
                cause: Box::new((*source).into()),
            },
            BackendError::Auth(msg) => GraphError::Auth(msg),
            BackendError::Config(msg) => GraphError::Parse(msg),
            BackendError::Cancelled => GraphError::Cancelled,
            BackendError::Io(e) => GraphError::Io(e),
        }
    }
}
