//! Drive-path resolution
//!
//! The logical backup root is described by a user-supplied URL plus a drive
//! addressing variant. Resolution, which may require one network call for
//! SharePoint sites, happens lazily, exactly once, and is memoized for the
//! lifetime of the backend instance.

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::pipeline::RequestPipeline;
use crate::types::SiteInfo;
use crate::urls::{normalize_slashes, API_VERSION, BASE_URL};

/// Which drive the adapter targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveAddressing {
    /// The signed-in user's default drive (`/me/drive`)
    Me,
    /// A drive addressed by id (`/drives/{id}`)
    DriveId(String),
    /// A group's default drive (`/groups/{id}/drive`)
    GroupId(String),
    /// A SharePoint site's default drive; the site id is resolved through
    /// `GET /sites/{host-relative}` on first use
    Site {
        /// Host-relative site reference, e.g. `contoso.sharepoint.com:/sites/ops`
        host_relative: String,
    },
}

/// The resolved `{apiVersion}{drivePath}` prefix plus the normalized root
/// path all remote names live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrivePrefix {
    pub api_version: String,
    pub drive_path: String,
    pub root_path: String,
}

/// Lazy, single-shot drive-prefix computation.
///
/// Concurrent first accesses share one resolution attempt via
/// [`OnceCell::get_or_try_init`]; a failed attempt leaves the cell empty so
/// a later call may retry.
pub struct DriveResolver {
    addressing: DriveAddressing,
    root_url: String,
    cell: OnceCell<DrivePrefix>,
}

impl DriveResolver {
    pub fn new(addressing: DriveAddressing, root_url: impl Into<String>) -> Self {
        Self {
            addressing,
            root_url: root_url.into(),
            cell: OnceCell::new(),
        }
    }

    /// The resolved prefix, computing it on first use.
    #[instrument(skip_all)]
    pub async fn resolve(
        &self,
        pipeline: &RequestPipeline,
        cancel: &CancellationToken,
    ) -> Result<&DrivePrefix> {
        self.cell
            .get_or_try_init(|| async {
                let drive_path = self.drive_path(pipeline, cancel).await?;
                let root_path = root_path_from_url(&self.root_url);
                debug!(drive_path, root_path, "Resolved drive prefix");

                Ok(DrivePrefix {
                    api_version: API_VERSION.to_string(),
                    drive_path,
                    root_path,
                })
            })
            .await
    }

    async fn drive_path(
        &self,
        pipeline: &RequestPipeline,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match &self.addressing {
            DriveAddressing::Me => Ok("/me/drive".to_string()),
            DriveAddressing::DriveId(id) => Ok(format!("/drives/{}", id)),
            DriveAddressing::GroupId(id) => Ok(format!("/groups/{}/drive", id)),
            DriveAddressing::Site { host_relative } => {
                let url = format!("{}{}/sites/{}", BASE_URL, API_VERSION, host_relative);
                let site: SiteInfo = pipeline
                    .get_json(&url, pipeline.timeouts().short, cancel)
                    .await?;
                Ok(format!("/sites/{}/drive", site.id))
            }
        }
    }
}

/// Extract the backup root path from the user-supplied URL.
///
/// The host and path components together form the logical path; they are
/// URL-decoded and slash-normalized. Input that does not parse as a URL is
/// treated as a bare path.
pub(crate) fn root_path_from_url(raw: &str) -> String {
    let combined = match url::Url::parse(raw) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("");
            format!("{}{}", host, parsed.path())
        }
        Err(_) => raw.to_string(),
    };

    let decoded = urlencoding::decode(&combined)
        .map(|d| d.into_owned())
        .unwrap_or(combined);

    normalize_slashes(&decoded)
}
