//! Graph storage backend
//!
//! [`MsGraphBackend`] implements the engine-facing
//! [`StorageBackend`](backend_traits::storage::StorageBackend) surface on top
//! of the request pipeline: listing via the paginated enumerator, streamed
//! downloads, single-PUT or sessioned uploads, and the small control-plane
//! operations.

use std::sync::Arc;

use async_trait::async_trait;
use backend_traits::auth::TokenProvider;
use backend_traits::error::{BackendError, Result};
use backend_traits::http::HttpClient;
use backend_traits::storage::{
    RemoteEntry, SinkStream, SourceStream, StorageBackend, StorageQuota,
};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::MsGraphConfig;
use crate::error::GraphError;
use crate::folders;
use crate::io::IdleTimeoutReader;
use crate::pager::Pager;
use crate::pipeline::{cancellable, RequestPipeline};
use crate::resolver::DriveResolver;
use crate::types::{Drive, DriveItem, RenameRequest};
use crate::upload::{ChunkedUploader, SINGLE_PUT_CEILING};
use crate::urls::DriveUrls;

/// Remote-storage adapter for a Microsoft Graph–backed drive.
pub struct MsGraphBackend {
    config: MsGraphConfig,
    pipeline: RequestPipeline,
    resolver: DriveResolver,
}

impl MsGraphBackend {
    pub fn new(
        config: MsGraphConfig,
        http: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let pipeline = RequestPipeline::new(http, tokens, config.timeouts);
        let resolver = DriveResolver::new(config.addressing.clone(), config.root_url.clone());

        Self {
            config,
            pipeline,
            resolver,
        }
    }

    pub fn config(&self) -> &MsGraphConfig {
        &self.config
    }

    async fn urls(&self, cancel: &CancellationToken) -> crate::error::Result<DriveUrls> {
        let prefix = self.resolver.resolve(&self.pipeline, cancel).await?;
        Ok(DriveUrls::new(prefix))
    }

    /// Convert a DriveItem into the engine-facing entry.
    ///
    /// Items the server reports without a name are dropped; nothing can be
    /// addressed through them.
    fn to_entry(item: DriveItem) -> Option<RemoteEntry> {
        let name = item.name.clone()?;
        let accessed_at = item
            .file_system_info
            .as_ref()
            .and_then(|info| info.last_accessed_date_time.clone());
        let modified_at = item
            .file_system_info
            .as_ref()
            .and_then(|info| info.last_modified_date_time.clone())
            .or_else(|| item.last_modified_date_time.clone());

        Some(RemoteEntry {
            id: item.id.clone().unwrap_or_default(),
            name,
            size: item.size.unwrap_or(0),
            is_file: item.is_file(),
            is_deleted: item.is_deleted(),
            accessed_at,
            modified_at,
        })
    }
}

#[async_trait]
impl StorageBackend for MsGraphBackend {
    #[instrument(skip(self, cancel))]
    async fn list(&self, cancel: CancellationToken) -> Result<Vec<RemoteEntry>> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        let mut pager: Pager<'_, DriveItem> =
            Pager::new(&self.pipeline, urls.children_url(), cancel.clone());

        let mut entries = Vec::new();
        loop {
            match pager.try_next().await {
                Ok(Some(item)) => {
                    if let Some(entry) = Self::to_entry(item) {
                        entries.push(entry);
                    }
                }
                Ok(None) => break,
                // A 404 mid-enumeration means the root itself is gone.
                Err(e) => return Err(e.into_folder_missing()),
            }
        }

        info!(entries = entries.len(), "Listed remote folder");
        Ok(entries)
    }

    #[instrument(skip(self, sink, cancel), fields(name = %name))]
    async fn get(
        &self,
        name: &str,
        sink: &mut SinkStream,
        cancel: CancellationToken,
    ) -> Result<()> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        let response = self
            .pipeline
            .get_stream(&urls.verb_url(name, "content"), &cancel)
            .await
            .map_err(BackendError::from)?;

        let mut reader =
            IdleTimeoutReader::new(response.body, self.config.timeouts.read_write);
        let copied = cancellable(&cancel, tokio::io::copy(&mut reader, sink))
            .await
            .map_err(BackendError::from)?
            .map_err(BackendError::Io)?;
        sink.flush().await?;

        debug!(bytes = copied, "Download complete");
        Ok(())
    }

    #[instrument(skip(self, source, cancel), fields(name = %name, length = length))]
    async fn put(
        &self,
        name: &str,
        source: &mut dyn SourceStream,
        length: u64,
        cancel: CancellationToken,
    ) -> Result<()> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        if length <= SINGLE_PUT_CEILING {
            let mut guarded =
                IdleTimeoutReader::new(&mut *source, self.config.timeouts.read_write);
            let mut buf = Vec::with_capacity(length as usize);
            cancellable(&cancel, guarded.read_to_end(&mut buf))
                .await
                .map_err(BackendError::from)?
                .map_err(BackendError::Io)?;

            if buf.len() as u64 != length {
                return Err(BackendError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("source ended at {} of {} bytes", buf.len(), length),
                )));
            }

            // Parsed for validation only.
            let item: DriveItem = self
                .pipeline
                .put_content(&urls.verb_url(name, "content"), Bytes::from(buf), &cancel)
                .await
                .map_err(BackendError::from)?;
            debug!(id = item.id.as_deref().unwrap_or(""), "Uploaded in one request");
        } else {
            let uploader = ChunkedUploader::new(&self.pipeline, &self.config);
            uploader
                .upload(
                    &urls.verb_url(name, "createUploadSession"),
                    source,
                    length,
                    &cancel,
                )
                .await
                .map_err(BackendError::from)?;
        }

        Ok(())
    }

    #[instrument(skip(self, cancel), fields(name = %name))]
    async fn delete(&self, name: &str, cancel: CancellationToken) -> Result<()> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        self.pipeline
            .delete(&urls.item_url(name), self.config.timeouts.short, &cancel)
            .await
            .map_err(BackendError::from)
    }

    #[instrument(skip(self, cancel), fields(name = %name, new_name = %new_name))]
    async fn rename(&self, name: &str, new_name: &str, cancel: CancellationToken) -> Result<()> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        self.pipeline
            .patch_json(
                &urls.item_url(name),
                &RenameRequest {
                    name: new_name.to_string(),
                },
                self.config.timeouts.short,
                &cancel,
            )
            .await
            .map_err(BackendError::from)
    }

    #[instrument(skip(self, cancel))]
    async fn create_folder(&self, cancel: CancellationToken) -> Result<()> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        folders::create_folder_path(&self.pipeline, &urls, &cancel)
            .await
            .map_err(GraphError::into_folder_missing)
    }

    #[instrument(skip(self, cancel))]
    async fn quota(&self, cancel: CancellationToken) -> Result<StorageQuota> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        let drive: Drive = self
            .pipeline
            .get_json(&urls.drive_url(), self.config.timeouts.short, &cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        // Some drives misreport an all-zero quota; report unknown instead.
        let quota = match drive.quota {
            Some(q) if q.is_reported() => StorageQuota {
                total: Some(q.total),
                remaining: Some(q.remaining),
            },
            _ => StorageQuota::default(),
        };

        Ok(quota)
    }

    #[instrument(skip(self, cancel))]
    async fn test(&self, cancel: CancellationToken) -> Result<()> {
        let urls = self
            .urls(&cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        self.pipeline
            .get_json::<DriveItem>(&urls.root_item_url(), self.config.timeouts.short, &cancel)
            .await
            .map_err(GraphError::into_folder_missing)?;

        // Credentials may allow metadata reads but not content access; a
        // small write/read round-trip proves both directions.
        let probe_name = format!(
            "graphvault-probe-{}.tmp",
            chrono::Utc::now().timestamp_millis()
        );
        let payload = b"graphvault connectivity probe";

        let mut source = std::io::Cursor::new(payload.to_vec());
        self.put(&probe_name, &mut source, payload.len() as u64, cancel.clone())
            .await?;

        let mut sink = std::io::Cursor::new(Vec::new());
        let readback = self.get(&probe_name, &mut sink, cancel.clone()).await;

        // Clean the probe up before judging the round-trip.
        self.delete(&probe_name, cancel.clone()).await?;
        readback?;

        if sink.into_inner() != payload {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "verification probe readback did not match the uploaded content",
            )));
        }

        info!("Backend verification succeeded");
        Ok(())
    }
}
