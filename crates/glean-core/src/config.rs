//! YAML target list.
//!
//! The file is a top-level sequence of records:
//!
//! ```yaml
//! - url: https://example.com/generators/elf
//!   selector: "#result"
//!   filename: elf_names.txt
//!   collision_threshold: 2   # optional
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HarvestError;
use crate::policy::PoolConfig;
use crate::target::{SourceId, Target};
use crate::util::normalize_url;

/// One record of the target list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub url: String,
    pub selector: String,
    pub filename: PathBuf,
    /// Overrides the pool-wide default threshold.
    #[serde(default)]
    pub collision_threshold: Option<NonZeroUsize>,
}

impl TargetConfig {
    /// Check required fields and build the target.
    pub fn into_target(self, default_threshold: NonZeroUsize) -> Result<Target, HarvestError> {
        if self.selector.trim().is_empty() {
            return Err(HarvestError::Config(format!(
                "Target '{}' has an empty selector",
                self.url
            )));
        }
        if self.filename.as_os_str().is_empty() {
            return Err(HarvestError::Config(format!(
                "Target '{}' has an empty filename",
                self.url
            )));
        }

        let url = normalize_url(&self.url)?;
        let threshold = self.collision_threshold.unwrap_or(default_threshold);
        Ok(Target::new(
            SourceId::new(url, self.selector.trim()),
            self.filename,
            threshold,
        ))
    }
}

/// Parse a YAML target list.
pub fn parse_targets(yaml: &str) -> Result<Vec<TargetConfig>, HarvestError> {
    let targets: Vec<TargetConfig> = serde_yaml::from_str(yaml)
        .map_err(|e| HarvestError::Config(format!("Invalid target list: {e}")))?;

    if targets.is_empty() {
        return Err(HarvestError::Config("Target list is empty".into()));
    }
    Ok(targets)
}

/// Read and parse a YAML target list from disk.
pub fn load_targets(path: &Path) -> Result<Vec<TargetConfig>, HarvestError> {
    tracing::debug!(path = %path.display(), "Loading target list");

    let yaml = std::fs::read_to_string(path).map_err(|e| {
        HarvestError::Config(format!("Failed to read {}: {e}", path.display()))
    })?;
    let targets = parse_targets(&yaml)?;

    tracing::debug!(?targets, "Loaded target list");
    Ok(targets)
}

/// Build targets from config records, failing on the first invalid one.
///
/// Records without their own `collision_threshold` take the pool's
/// `default_threshold`.
pub fn build_targets(
    configs: Vec<TargetConfig>,
    pool: &PoolConfig,
) -> Result<Vec<Target>, HarvestError> {
    configs
        .into_iter()
        .map(|c| c.into_target(pool.default_threshold))
        .collect()
}
