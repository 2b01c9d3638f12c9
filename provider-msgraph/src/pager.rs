//! Paginated collection enumeration
//!
//! Graph list endpoints return bounded pages linked by `@odata.nextLink`.
//! [`Pager`] turns a starting URL into a lazy, finite, one-shot sequence of
//! items: each page is fetched only when the previous one is drained.

use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::RequestPipeline;
use crate::types::GraphCollection;

/// Cursor over a paginated Graph collection.
///
/// Non-restartable: once drained it stays empty.
pub struct Pager<'a, T> {
    pipeline: &'a RequestPipeline,
    next_url: Option<String>,
    buffer: VecDeque<T>,
    cancel: CancellationToken,
}

impl<'a, T: DeserializeOwned> Pager<'a, T> {
    pub fn new(
        pipeline: &'a RequestPipeline,
        start_url: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pipeline,
            next_url: Some(start_url.into()),
            buffer: VecDeque::new(),
            cancel,
        }
    }

    /// The next item, fetching further pages as needed.
    ///
    /// Returns `Ok(None)` when the server reports no continuation link and
    /// the current page is exhausted.
    pub async fn try_next(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }

            let Some(url) = self.next_url.take() else {
                return Ok(None);
            };

            let page: GraphCollection<T> = self
                .pipeline
                .get_json(&url, self.pipeline.timeouts().list, &self.cancel)
                .await?;

            debug!(items = page.value.len(), more = page.next_link.is_some(), "Fetched page");

            self.next_url = page.next_link.filter(|link| !link.is_empty());
            self.buffer.extend(page.value);
        }
    }

    /// Drain the remaining items into a vector.
    pub async fn collect_remaining(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.try_next().await? {
            items.push(item);
        }
        Ok(items)
    }
}
