pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod pool;
pub mod snapshot;
pub mod target;
pub mod testutil;
pub mod traits;
pub mod util;
pub mod work_queue;
pub mod worker;

pub use config::TargetConfig;
pub use error::HarvestError;
pub use models::{RunSummary, TargetOutcome, TargetReport};
pub use policy::{PoolConfig, RetryPolicy};
pub use pool::HarvestPool;
pub use snapshot::SnapshotService;
pub use target::{SourceId, Target, TargetState};
pub use traits::{Extractor, Fetcher, SnapshotSource};
pub use work_queue::WorkQueue;
pub use worker::{TracingWorkerReporter, WorkerEvent, WorkerReporter, WorkerService};
