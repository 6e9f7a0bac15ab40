use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use glean_client::{ReqwestFetcher, SelectorExtractor};
use glean_core::config::{build_targets, load_targets};
use glean_core::{
    HarvestPool, PoolConfig, RetryPolicy, RunSummary, SnapshotService, TargetOutcome,
    TracingWorkerReporter,
};

#[derive(Parser)]
#[command(
    name = "glean",
    version,
    about = "Harvest deduplicated name lists from randomized generator pages"
)]
struct Cli {
    /// YAML file listing the targets (url, selector, filename)
    #[arg(long, env = "GLEAN_CONFIG")]
    config: PathBuf,

    /// Enable debug output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Number of concurrent workers
    #[arg(long, env = "GLEAN_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Collisions in one snapshot that mark a target as exhausted
    /// (targets may override it)
    #[arg(long, env = "GLEAN_COLLISION_THRESHOLD", default_value = "1")]
    collision_threshold: NonZeroUsize,

    /// Per-fetch timeout in seconds
    #[arg(long, env = "GLEAN_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Retry policy for failed fetches: "forever", "fail-fast", or a retry count
    #[arg(long, env = "GLEAN_RETRY", default_value = "10")]
    retry: RetryPolicy,

    /// Give up on a target after this many snapshots without converging
    #[arg(long, env = "GLEAN_MAX_SAMPLES")]
    max_samples: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Setup tracing
    let directive = if cli.debug {
        "glean=debug"
    } else {
        "glean=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let configs = load_targets(&cli.config)
        .with_context(|| format!("Failed to load targets from {}", cli.config.display()))?;
    for config in &configs {
        SelectorExtractor::validate(&config.selector)
            .with_context(|| format!("Bad selector for {}", config.url))?;
    }

    let config = PoolConfig::default()
        .with_workers(cli.workers)
        .with_fetch_timeout(Duration::from_secs(cli.fetch_timeout))
        .with_retry_policy(cli.retry)
        .with_default_threshold(cli.collision_threshold)
        .with_max_samples(cli.max_samples);
    let targets = build_targets(configs, &config)?;

    let fetcher = ReqwestFetcher::with_timeout(config.fetch_timeout);
    let source = SnapshotService::new(fetcher, SelectorExtractor::new());
    let pool = HarvestPool::new(source, config);

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let summary = pool
        .run(targets, cancel_token, Arc::new(TracingWorkerReporter))
        .await;
    log_summary(&summary);

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} targets did not finish",
            summary.reports.len() - summary.persisted().count(),
            summary.reports.len()
        );
    }

    Ok(())
}

/// Cancel the run on CTRL+C; in-flight fetches are dropped and the
/// remaining targets reported as abandoned.
async fn shutdown_signal(cancel_token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install CTRL+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
    cancel_token.cancel();
}

fn log_summary(summary: &RunSummary) {
    for report in &summary.reports {
        match &report.outcome {
            TargetOutcome::Persisted => tracing::info!(
                url = %report.url,
                output = %report.output.display(),
                items = report.items,
                samples = report.samples,
                "Saved"
            ),
            TargetOutcome::Failed { reason } => tracing::warn!(
                url = %report.url,
                output = %report.output.display(),
                %reason,
                "Failed"
            ),
            TargetOutcome::Abandoned => tracing::warn!(
                url = %report.url,
                items = report.items,
                "Abandoned before converging"
            ),
        }
    }

    tracing::info!(
        persisted = summary.persisted().count(),
        failed = summary.failed().count(),
        abandoned = summary.abandoned().count(),
        "Harvest finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["glean", "--config", "targets.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("targets.yaml"));
        assert!(!cli.debug);
        assert_eq!(cli.workers, 4);
        assert_eq!(cli.collision_threshold.get(), 1);
        assert_eq!(cli.retry, RetryPolicy::RetryN(10));
        assert_eq!(cli.max_samples, None);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "glean",
            "--config",
            "targets.yaml",
            "-d",
            "--workers",
            "8",
            "--retry",
            "forever",
            "--collision-threshold",
            "3",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.workers, 8);
        assert_eq!(cli.retry, RetryPolicy::RetryForever);
        assert_eq!(cli.collision_threshold.get(), 3);
    }

    #[test]
    fn test_cli_requires_config() {
        assert!(Cli::try_parse_from(["glean"]).is_err());
    }

    #[test]
    fn test_cli_rejects_zero_threshold() {
        let parsed =
            Cli::try_parse_from(["glean", "--config", "t.yaml", "--collision-threshold", "0"]);
        assert!(parsed.is_err());
    }
}
