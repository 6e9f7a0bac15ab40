use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error types shared across the glean crates.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    Network(String),

    /// Snapshot fetch did not finish in time.
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// CSS selector could not be parsed.
    #[error("Invalid selector '{0}'")]
    Selector(String),

    /// Writing the accumulated items to disk failed.
    #[error("Failed to persist {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The retry policy gave up on a target.
    #[error("Gave up after {attempts} failed fetch attempts (last error: {last})")]
    RetriesExhausted { attempts: u32, last: String },

    /// The target hit its sample bound without converging.
    #[error("Did not converge after {samples} snapshots")]
    NotConverged { samples: u32 },
}

impl HarvestError {
    /// Returns true for failures that happen while obtaining a snapshot.
    ///
    /// These are the errors the worker retries according to its
    /// [`RetryPolicy`](crate::policy::RetryPolicy).
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            HarvestError::Http(_)
                | HarvestError::Network(_)
                | HarvestError::Timeout(_)
                | HarvestError::Selector(_)
        )
    }
}
