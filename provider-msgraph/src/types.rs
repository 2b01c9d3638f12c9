//! Microsoft Graph API response types
//!
//! Data structures for (de)serializing Graph drive resources. Only the
//! fields this adapter consumes are modeled; everything else the server
//! sends is ignored.

use serde::{Deserialize, Serialize};

/// A file or folder in a Graph drive
///
/// See: https://learn.microsoft.com/graph/api/resources/driveitem
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    /// Item ID
    pub id: Option<String>,

    /// Item name
    pub name: Option<String>,

    /// Size in bytes (folders report the subtree size)
    #[serde(default)]
    pub size: Option<u64>,

    /// Present when the item is a regular file
    pub file: Option<FileFacet>,

    /// Present when the item is a folder
    pub folder: Option<FolderFacet>,

    /// Present when the item has been deleted
    pub deleted: Option<DeletedFacet>,

    /// Client-visible filesystem timestamps
    pub file_system_info: Option<FileSystemInfo>,

    /// Server-side modification time (RFC 3339)
    pub last_modified_date_time: Option<String>,
}

impl DriveItem {
    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.is_some()
    }
}

/// File facet; presence marks an item as a regular file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Folder facet; presence marks an item as a folder.
///
/// Serialized as `{}` when creating folders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u64>,
}

/// Deleted facet; presence marks an item as deleted
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedFacet {
    pub state: Option<String>,
}

/// Filesystem timestamps reported by the drive
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSystemInfo {
    pub last_accessed_date_time: Option<String>,
    pub last_modified_date_time: Option<String>,
}

/// A page of a Graph collection response
///
/// `@odata.nextLink` carries the continuation URL when more pages follow.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphCollection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Response to `createUploadSession`
///
/// See: https://learn.microsoft.com/graph/api/driveitem-createuploadsession
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Absolute URL fragment PUTs target; requests to it are sent unsigned
    pub upload_url: Option<String>,

    /// When the server abandons the session
    pub expiration_date_time: Option<String>,

    /// Byte ranges the server still expects; informational only, the
    /// uploader derives its own offsets
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Response to a fragment PUT.
///
/// Non-final fragments report the session state; the final fragment returns
/// the completed [`DriveItem`]. Every field is optional so both shapes parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    pub expiration_date_time: Option<String>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Drive resource; only quota is consumed
#[derive(Debug, Clone, Deserialize)]
pub struct Drive {
    pub id: Option<String>,
    pub quota: Option<DriveQuota>,
}

/// Drive space accounting
///
/// Some drives misreport an all-zero quota; callers treat that as unknown.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriveQuota {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub used: u64,
    #[serde(default)]
    pub remaining: u64,
}

impl DriveQuota {
    pub fn is_reported(&self) -> bool {
        self.total != 0 || self.used != 0 || self.remaining != 0
    }
}

/// SharePoint site resource; only the id is consumed
#[derive(Debug, Clone, Deserialize)]
pub struct SiteInfo {
    pub id: String,
    pub name: Option<String>,
}

/// Body of a create-folder POST: `{"name": ..., "folder": {}}`
#[derive(Debug, Clone, Serialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub folder: FolderFacet,
}

impl CreateFolderRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: FolderFacet::default(),
        }
    }
}

/// Body of a rename PATCH: `{"name": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct RenameRequest {
    pub name: String,
}
