use tokio_util::sync::CancellationToken;

use crate::error::HarvestError;
use crate::models::{TargetOutcome, TargetReport};
use crate::policy::PoolConfig;
use crate::target::Target;
use crate::traits::SnapshotSource;
use crate::work_queue::WorkQueue;

/// Events emitted by the worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    SnapshotRequested {
        worker_id: &'a str,
        target: &'a Target,
    },
    Sampled {
        worker_id: &'a str,
        target: &'a Target,
        collisions: usize,
        new_items: usize,
    },
    FetchFailed {
        worker_id: &'a str,
        target: &'a Target,
        error: &'a HarvestError,
        will_retry: bool,
    },
    Persisted {
        worker_id: &'a str,
        target: &'a Target,
    },
    TargetFailed {
        worker_id: &'a str,
        target: &'a Target,
        error: &'a HarvestError,
    },
    Interrupted {
        worker_id: &'a str,
        target: &'a Target,
    },
    Stopped {
        worker_id: &'a str,
        finished: usize,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::debug!(%worker_id, "Worker started");
            }
            WorkerEvent::SnapshotRequested { worker_id, target } => {
                tracing::debug!(
                    %worker_id,
                    url = %target.source().url,
                    selector = %target.source().selector,
                    "Fetching snapshot"
                );
            }
            WorkerEvent::Sampled {
                worker_id,
                target,
                collisions,
                new_items,
            } => {
                tracing::debug!(
                    %worker_id,
                    url = %target.source().url,
                    %collisions,
                    %new_items,
                    total = target.items().len(),
                    "Merged snapshot"
                );
            }
            WorkerEvent::FetchFailed {
                worker_id,
                target,
                error,
                will_retry,
            } => {
                tracing::warn!(
                    %worker_id,
                    url = %target.source().url,
                    %error,
                    attempts = target.fetch_failures(),
                    %will_retry,
                    "Error fetching snapshot"
                );
            }
            WorkerEvent::Persisted { worker_id, target } => {
                tracing::info!(
                    %worker_id,
                    url = %target.source().url,
                    output = %target.output().display(),
                    items = target.items().len(),
                    samples = target.samples(),
                    "Target converged and saved"
                );
            }
            WorkerEvent::TargetFailed {
                worker_id,
                target,
                error,
            } => {
                tracing::error!(
                    %worker_id,
                    url = %target.source().url,
                    output = %target.output().display(),
                    %error,
                    "Target failed"
                );
            }
            WorkerEvent::Interrupted { worker_id, target } => {
                tracing::info!(
                    %worker_id,
                    url = %target.source().url,
                    "Fetch interrupted by shutdown"
                );
            }
            WorkerEvent::Stopped {
                worker_id,
                finished,
            } => {
                tracing::debug!(%worker_id, %finished, "Worker stopped");
            }
        }
    }
}

/// Worker that takes targets off the queue, samples them, and decides
/// whether to requeue or finalize.
pub struct WorkerService<S>
where
    S: SnapshotSource,
{
    worker_id: String,
    queue: WorkQueue,
    source: S,
    config: PoolConfig,
}

impl<S> WorkerService<S>
where
    S: SnapshotSource,
{
    pub fn new(
        worker_id: impl Into<String>,
        queue: WorkQueue,
        source: S,
        config: PoolConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            source,
            config,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run the worker loop until the queue closes or cancellation.
    ///
    /// Returns a report for every target this worker brought to a terminal
    /// state.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Vec<TargetReport> {
        reporter.report(WorkerEvent::Started {
            worker_id: &self.worker_id,
        });

        let mut finished = Vec::new();
        loop {
            let target = tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                popped = self.queue.pop() => match popped {
                    Some(target) => target,
                    None => break,
                },
            };

            if let Some(report) = self.process(target, &cancel_token, reporter).await {
                finished.push(report);
            }
        }

        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.worker_id,
            finished: finished.len(),
        });
        finished
    }

    /// Take one snapshot of `target` and route it: requeue, persist, or fail.
    ///
    /// Returns a report only when the target reached a terminal state.
    pub async fn process<WR: WorkerReporter>(
        &self,
        mut target: Target,
        cancel_token: &CancellationToken,
        reporter: &WR,
    ) -> Option<TargetReport> {
        reporter.report(WorkerEvent::SnapshotRequested {
            worker_id: &self.worker_id,
            target: &target,
        });

        let timeout = self.config.fetch_timeout;
        let fetched = tokio::select! {
            biased;
            () = cancel_token.cancelled() => None,
            result = tokio::time::timeout(timeout, self.source.snapshot(target.source())) => {
                Some(result.unwrap_or_else(|_| Err(HarvestError::Timeout(timeout))))
            }
        };

        let Some(fetched) = fetched else {
            reporter.report(WorkerEvent::Interrupted {
                worker_id: &self.worker_id,
                target: &target,
            });
            self.queue.requeue(target);
            return None;
        };

        let items = match fetched {
            Ok(items) => items,
            Err(error) => return self.handle_fetch_failure(target, error, reporter),
        };

        let before = target.items().len();
        let collisions = target.merge(items);
        reporter.report(WorkerEvent::Sampled {
            worker_id: &self.worker_id,
            target: &target,
            collisions,
            new_items: target.items().len() - before,
        });

        if target.is_converged() {
            return Some(self.finalize(target, reporter).await);
        }

        if let Some(max_samples) = self.config.max_samples
            && target.samples() >= max_samples
        {
            let error = HarvestError::NotConverged {
                samples: target.samples(),
            };
            return Some(self.fail(target, error, reporter));
        }

        self.queue.requeue(target);
        None
    }

    fn handle_fetch_failure<WR: WorkerReporter>(
        &self,
        mut target: Target,
        error: HarvestError,
        reporter: &WR,
    ) -> Option<TargetReport> {
        let attempts = target.record_fetch_failure();
        let will_retry = self.config.retry_policy.allows_retry(attempts);
        reporter.report(WorkerEvent::FetchFailed {
            worker_id: &self.worker_id,
            target: &target,
            error: &error,
            will_retry,
        });

        if will_retry {
            self.queue.requeue(target);
            return None;
        }

        let error = HarvestError::RetriesExhausted {
            attempts,
            last: error.to_string(),
        };
        Some(self.fail(target, error, reporter))
    }

    async fn finalize<WR: WorkerReporter>(
        &self,
        mut target: Target,
        reporter: &WR,
    ) -> TargetReport {
        match target.persist().await {
            Ok(()) => {
                reporter.report(WorkerEvent::Persisted {
                    worker_id: &self.worker_id,
                    target: &target,
                });
                self.queue.settle();
                TargetReport::new(&target, TargetOutcome::Persisted)
            }
            Err(error) => self.fail(target, error, reporter),
        }
    }

    fn fail<WR: WorkerReporter>(
        &self,
        mut target: Target,
        error: HarvestError,
        reporter: &WR,
    ) -> TargetReport {
        target.fail();
        reporter.report(WorkerEvent::TargetFailed {
            worker_id: &self.worker_id,
            target: &target,
            error: &error,
        });
        self.queue.settle();
        TargetReport::new(
            &target,
            TargetOutcome::Failed {
                reason: error.to_string(),
            },
        )
    }
}
