use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::models::{RunSummary, TargetOutcome, TargetReport};
use crate::policy::PoolConfig;
use crate::target::Target;
use crate::traits::SnapshotSource;
use crate::work_queue::WorkQueue;
use crate::worker::{WorkerReporter, WorkerService};

/// Fixed-size pool of workers sharing one [`WorkQueue`].
pub struct HarvestPool<S>
where
    S: SnapshotSource,
{
    source: S,
    config: PoolConfig,
}

impl<S> HarvestPool<S>
where
    S: SnapshotSource,
{
    pub fn new(source: S, config: PoolConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Sample every target until it converges or fails.
    ///
    /// Returns once every target reached a terminal state, or after
    /// `cancel_token` fires and the workers have stopped. Targets that never
    /// got to finish are reported as [`TargetOutcome::Abandoned`].
    pub async fn run<WR>(
        &self,
        targets: Vec<Target>,
        cancel_token: CancellationToken,
        reporter: Arc<WR>,
    ) -> RunSummary
    where
        WR: WorkerReporter + 'static,
    {
        let queue = WorkQueue::new();
        for target in targets {
            queue.seed(target);
        }

        if queue.outstanding() == 0 {
            tracing::info!("No targets to harvest");
            return RunSummary::default();
        }

        let workers = self.config.workers.max(1);
        tracing::info!(
            targets = queue.outstanding(),
            %workers,
            retry_policy = %self.config.retry_policy,
            "Starting harvest"
        );

        let mut tasks = JoinSet::new();
        for i in 0..workers {
            let worker = WorkerService::new(
                format!("worker-{i}"),
                queue.clone(),
                self.source.clone(),
                self.config.clone(),
            );
            let cancel_token = cancel_token.clone();
            let reporter = Arc::clone(&reporter);
            tasks.spawn(async move { worker.run(cancel_token, reporter.as_ref()).await });
        }

        tokio::select! {
            () = queue.join() => {}
            () = cancel_token.cancelled() => {
                tracing::info!("Harvest cancelled, waiting for workers to stop");
            }
        }
        queue.close();

        let mut reports: Vec<TargetReport> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(finished) => reports.extend(finished),
                Err(e) => tracing::error!(error = %e, "Worker task failed"),
            }
        }

        for target in queue.drain() {
            reports.push(TargetReport::new(&target, TargetOutcome::Abandoned));
        }

        RunSummary { reports }
    }
}
