//! Folder creation
//!
//! Walks the root path segment by segment, creating each missing folder
//! under the last known parent's id. All calls run under the short timeout.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::pipeline::RequestPipeline;
use crate::types::{CreateFolderRequest, DriveItem};
use crate::urls::DriveUrls;

/// Ensure every segment of the backup root path exists.
pub(crate) async fn create_folder_path(
    pipeline: &RequestPipeline,
    urls: &DriveUrls,
    cancel: &CancellationToken,
) -> Result<()> {
    let short = pipeline.timeouts().short;

    let root: DriveItem = pipeline
        .get_json(&urls.drive_root_url(), short, cancel)
        .await?;
    let mut parent_id = item_id(root)?;

    let mut prefix = String::new();
    for segment in urls.root_path().split('/').filter(|s| !s.is_empty()) {
        prefix.push('/');
        prefix.push_str(segment);

        let item_url = urls.item_by_path_url(&prefix);
        match pipeline.get_json::<DriveItem>(&item_url, short, cancel).await {
            Ok(item) => {
                debug!(path = %prefix, "Folder already exists");
                parent_id = item_id(item)?;
            }
            Err(GraphError::NotFound) => {
                info!(path = %prefix, "Creating missing folder");
                let created: DriveItem = pipeline
                    .post_json(
                        &urls.children_of_item_url(&parent_id),
                        &CreateFolderRequest::new(segment),
                        short,
                        cancel,
                    )
                    .await?;
                parent_id = item_id(created)?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

fn item_id(item: DriveItem) -> Result<String> {
    item.id
        .ok_or_else(|| GraphError::Parse("drive item response without an id".to_string()))
}
