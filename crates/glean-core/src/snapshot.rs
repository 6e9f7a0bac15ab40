use crate::error::HarvestError;
use crate::target::SourceId;
use crate::traits::{Extractor, Fetcher, SnapshotSource};

/// Snapshot source that downloads a page and extracts items from it.
///
/// Pipeline: fetch HTML → select items.
#[derive(Clone)]
pub struct SnapshotService<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    fetcher: F,
    extractor: E,
}

impl<F, E> SnapshotService<F, E>
where
    F: Fetcher,
    E: Extractor,
{
    pub fn new(fetcher: F, extractor: E) -> Self {
        Self { fetcher, extractor }
    }
}

impl<F, E> SnapshotSource for SnapshotService<F, E>
where
    F: Fetcher + 'static,
    E: Extractor + 'static,
{
    async fn snapshot(&self, source: &SourceId) -> Result<Vec<String>, HarvestError> {
        let html = self.fetcher.fetch(source.url.as_str()).await?;
        tracing::debug!(url = %source.url, bytes = html.len(), "Downloaded page");
        let items = self.extractor.extract(&html, &source.selector)?;

        tracing::debug!(url = %source.url, items = items.len(), "Extracted items");
        Ok(items)
    }
}
