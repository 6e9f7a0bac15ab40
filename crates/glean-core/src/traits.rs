use std::future::Future;

use crate::error::HarvestError;
use crate::target::SourceId;

/// Fetches the current HTML snapshot of a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, HarvestError>> + Send;
}

/// Pulls plain-text items out of an HTML document.
///
/// A selector that matches nothing yields an empty list, not an error.
pub trait Extractor: Send + Sync + Clone {
    fn extract(&self, html: &str, selector: &str) -> Result<Vec<String>, HarvestError>;
}

/// Produces one snapshot of items for a source.
///
/// This is the only collaborator the worker pool talks to. Repeated calls for
/// the same source may return different items (randomized generator pages).
pub trait SnapshotSource: Send + Sync + Clone + 'static {
    fn snapshot(
        &self,
        source: &SourceId,
    ) -> impl Future<Output = Result<Vec<String>, HarvestError>> + Send;
}
