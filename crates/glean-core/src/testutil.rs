//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::HarvestError;
use crate::target::SourceId;
use crate::traits::{Extractor, Fetcher, SnapshotSource};
use crate::worker::{WorkerEvent, WorkerReporter};

/// Build an owned snapshot from string literals.
pub fn snapshot(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns an empty document.
    responses: Arc<Mutex<Vec<Result<String, HarvestError>>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: HarvestError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, HarvestError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs passed to `fetch`, in call order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, HarvestError> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(String::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that treats every non-empty line of the document as an item.
#[derive(Clone)]
pub struct MockExtractor {
    error: Arc<Mutex<Option<HarvestError>>>,
}

impl MockExtractor {
    pub fn lines() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates an extractor that returns an error on its first call.
    pub fn with_error(error: HarvestError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Extractor for MockExtractor {
    fn extract(&self, html: &str, _selector: &str) -> Result<Vec<String>, HarvestError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(html
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

type Script = VecDeque<Result<Vec<String>, HarvestError>>;

/// Snapshot source that replays a per-URL script of results.
///
/// Once a URL's script runs out, every call returns the fallback snapshot
/// (an empty one unless set).
#[derive(Clone, Default)]
pub struct ScriptedSource {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    fallback: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for `url` (compared against the normalized URL string).
    pub fn script(self, url: &str, results: Vec<Result<Vec<String>, HarvestError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(results);
        self
    }

    pub fn with_fallback(self, items: Vec<String>) -> Self {
        *self.fallback.lock().unwrap() = items;
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of snapshot calls made for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

impl SnapshotSource for ScriptedSource {
    async fn snapshot(&self, source: &SourceId) -> Result<Vec<String>, HarvestError> {
        let key = source.url.to_string();
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|script| script.pop_front());
        match next {
            Some(result) => result,
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records the kind of every event it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingReporter {
    /// How many events of `kind` were reported (e.g. `"persisted"`).
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }
}

impl WorkerReporter for RecordingReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        let kind = match event {
            WorkerEvent::Started { .. } => "started",
            WorkerEvent::SnapshotRequested { .. } => "snapshot_requested",
            WorkerEvent::Sampled { .. } => "sampled",
            WorkerEvent::FetchFailed { .. } => "fetch_failed",
            WorkerEvent::Persisted { .. } => "persisted",
            WorkerEvent::TargetFailed { .. } => "target_failed",
            WorkerEvent::Interrupted { .. } => "interrupted",
            WorkerEvent::Stopped { .. } => "stopped",
        };
        self.events.lock().unwrap().push(kind);
    }
}
