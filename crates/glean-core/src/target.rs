use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::HarvestError;

/// Where a target's snapshots come from: a page URL plus the selector of the
/// element whose children are the items.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub url: Url,
    pub selector: String,
}

impl SourceId {
    pub fn new(url: Url, selector: impl Into<String>) -> Self {
        Self {
            url,
            selector: selector.into(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.url, self.selector)
    }
}

/// Lifecycle of a target.
///
/// ```text
/// PENDING --merge--> SAMPLING --merge, collisions >= threshold--> CONVERGED --persist--> PERSISTED
///    |                  |                                             |
///    +------------------+------ retries exhausted / write error ------+--> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Sampling,
    Converged,
    Persisted,
    Failed,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Pending => "pending",
            TargetState::Sampling => "sampling",
            TargetState::Converged => "converged",
            TargetState::Persisted => "persisted",
            TargetState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TargetState::Persisted | TargetState::Failed)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One source sampled until its snapshots stop producing new items.
///
/// A `Target` has no interior locking. It is moved through the
/// [`WorkQueue`](crate::work_queue::WorkQueue) by value, so at most one
/// worker can touch it at a time; keep it that way.
#[derive(Debug)]
pub struct Target {
    source: SourceId,
    output: PathBuf,
    collision_threshold: NonZeroUsize,
    accumulated: Vec<String>,
    seen: HashSet<String>,
    last_collisions: Option<usize>,
    samples: u32,
    fetch_failures: u32,
    state: TargetState,
}

impl Target {
    pub fn new(
        source: SourceId,
        output: impl Into<PathBuf>,
        collision_threshold: NonZeroUsize,
    ) -> Self {
        Self {
            source,
            output: output.into(),
            collision_threshold,
            accumulated: Vec::new(),
            seen: HashSet::new(),
            last_collisions: None,
            samples: 0,
            fetch_failures: 0,
            state: TargetState::Pending,
        }
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn collision_threshold(&self) -> NonZeroUsize {
        self.collision_threshold
    }

    /// Unique items in first-seen order.
    pub fn items(&self) -> &[String] {
        &self.accumulated
    }

    /// Collisions of the most recent merge; `None` before the first one.
    pub fn last_collisions(&self) -> Option<usize> {
        self.last_collisions
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn fetch_failures(&self) -> u32 {
        self.fetch_failures
    }

    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Merge one snapshot, returning how many of its items were already known.
    ///
    /// Duplicates inside the snapshot itself count too: `["a", "b", "a"]` on an
    /// empty target yields one collision.
    pub fn merge<I>(&mut self, snapshot: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut collisions = 0;
        for item in snapshot {
            if self.seen.contains(&item) {
                collisions += 1;
            } else {
                self.seen.insert(item.clone());
                self.accumulated.push(item);
            }
        }

        self.samples += 1;
        self.last_collisions = Some(collisions);
        if !self.state.is_terminal() {
            self.state = if collisions >= self.collision_threshold.get() {
                TargetState::Converged
            } else {
                TargetState::Sampling
            };
        }
        collisions
    }

    /// True once the latest merge reached the collision threshold.
    pub fn is_converged(&self) -> bool {
        matches!(self.state, TargetState::Converged | TargetState::Persisted)
    }

    /// Count a failed fetch attempt and return the running total.
    pub fn record_fetch_failure(&mut self) -> u32 {
        self.fetch_failures += 1;
        self.fetch_failures
    }

    /// Move the target to the terminal `Failed` state.
    pub fn fail(&mut self) {
        if self.state != TargetState::Persisted {
            self.state = TargetState::Failed;
        }
    }

    /// Write the accumulated items to the output file, one per line.
    ///
    /// The file is truncated and rewritten. Once a target is persisted further
    /// calls return `Ok(())` without touching the file.
    pub async fn persist(&mut self) -> Result<(), HarvestError> {
        if self.state == TargetState::Persisted {
            return Ok(());
        }

        let mut contents =
            String::with_capacity(self.accumulated.iter().map(|s| s.len() + 1).sum());
        for item in &self.accumulated {
            contents.push_str(item);
            contents.push('\n');
        }

        tracing::debug!(
            output = %self.output.display(),
            items = self.accumulated.len(),
            "Saving items"
        );
        tokio::fs::write(&self.output, contents)
            .await
            .map_err(|source| HarvestError::Persist {
                path: self.output.clone(),
                source,
            })?;

        self.state = TargetState::Persisted;
        Ok(())
    }
}
