use std::sync::Arc;
use std::time::Duration;

use glean_core::testutil::{RecordingReporter, ScriptedSource, snapshot};
use glean_core::{HarvestError, HarvestPool, PoolConfig, RetryPolicy, TargetOutcome};
use tokio_util::sync::CancellationToken;

use crate::common::{make_target, read_lines, source_url};

#[tokio::test]
async fn names_converge_at_threshold_two() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new().script(
        &source_url(0),
        vec![
            Ok(snapshot(&["Aldric", "Bryn"])),
            Ok(snapshot(&["Bryn", "Corwin"])),
            Ok(snapshot(&["Corwin", "Corwin"])),
        ],
    );
    let reporter = Arc::new(RecordingReporter::default());
    let pool = HarvestPool::new(source.clone(), PoolConfig::default());

    let summary = pool
        .run(
            vec![make_target(dir.path(), 0, 2)],
            CancellationToken::new(),
            Arc::clone(&reporter),
        )
        .await;

    assert!(summary.is_success());
    assert_eq!(summary.reports[0].samples, 3);
    assert_eq!(source.calls(&source_url(0)), 3);
    assert_eq!(
        read_lines(&dir.path().join("names_0.txt")),
        ["Aldric", "Bryn", "Corwin"]
    );
    assert_eq!(reporter.count("persisted"), 1);
}

#[tokio::test]
async fn every_target_persists_with_fewer_workers_than_targets() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = ScriptedSource::new();
    for n in 0..10 {
        let a = format!("name-{n}-a");
        let b = format!("name-{n}-b");
        source = source.script(
            &source_url(n),
            vec![
                Ok(vec![a.clone()]),
                Ok(vec![b.clone()]),
                Ok(vec![a, b]),
            ],
        );
    }
    let targets = (0..10).map(|n| make_target(dir.path(), n, 2)).collect();
    let pool = HarvestPool::new(source, PoolConfig::default().with_workers(3));

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        pool.run(
            targets,
            CancellationToken::new(),
            Arc::new(RecordingReporter::default()),
        ),
    )
    .await
    .expect("pool should finish once every target is persisted");

    assert_eq!(summary.reports.len(), 10);
    assert_eq!(summary.persisted().count(), 10);
    for n in 0..10 {
        let lines = read_lines(&dir.path().join(format!("names_{n}.txt")));
        assert_eq!(lines, [format!("name-{n}-a"), format!("name-{n}-b")]);
    }
}

#[tokio::test]
async fn failed_fetch_leaves_no_trace_in_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new().script(
        &source_url(0),
        vec![
            Err(HarvestError::Network("connection reset".into())),
            Ok(snapshot(&["Aldric", "Bryn"])),
            Ok(snapshot(&["Bryn", "Corwin"])),
        ],
    );
    let pool = HarvestPool::new(source, PoolConfig::default());

    let summary = pool
        .run(
            vec![make_target(dir.path(), 0, 1)],
            CancellationToken::new(),
            Arc::new(RecordingReporter::default()),
        )
        .await;

    assert!(summary.is_success());
    assert_eq!(summary.reports[0].fetch_failures, 1);
    assert_eq!(summary.reports[0].samples, 2);
    assert_eq!(
        read_lines(&dir.path().join("names_0.txt")),
        ["Aldric", "Bryn", "Corwin"]
    );
}

#[tokio::test]
async fn exhausted_retries_fail_target_without_blocking_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new()
        .script(
            &source_url(0),
            vec![
                Err(HarvestError::Http("HTTP 503".into())),
                Err(HarvestError::Http("HTTP 503".into())),
                Err(HarvestError::Http("HTTP 503".into())),
            ],
        )
        .script(&source_url(1), vec![Ok(snapshot(&["x", "x"]))]);
    let config = PoolConfig::default()
        .with_workers(2)
        .with_retry_policy(RetryPolicy::RetryN(2));
    let pool = HarvestPool::new(source.clone(), config);

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        pool.run(
            vec![make_target(dir.path(), 0, 1), make_target(dir.path(), 1, 1)],
            CancellationToken::new(),
            Arc::new(RecordingReporter::default()),
        ),
    )
    .await
    .unwrap();

    assert_eq!(summary.persisted().count(), 1);
    let failed: Vec<_> = summary.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].fetch_failures, 3);
    assert_eq!(source.calls(&source_url(0)), 3);
    assert!(!dir.path().join("names_0.txt").exists());
}

#[tokio::test]
async fn cancellation_reports_unfinished_targets_as_abandoned() {
    let dir = tempfile::tempdir().unwrap();
    // Never converges: every snapshot is new and non-colliding.
    let source = ScriptedSource::new().with_delay(Duration::from_millis(5));
    let config = PoolConfig::default()
        .with_workers(2)
        .with_retry_policy(RetryPolicy::RetryForever);
    let pool = HarvestPool::new(source, config);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let targets = (0..3).map(|n| make_target(dir.path(), n, 1)).collect();
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        pool.run(targets, cancel, Arc::new(RecordingReporter::default())),
    )
    .await
    .expect("pool should stop after cancellation");
    canceller.await.unwrap();

    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.abandoned().count(), 3);
    assert!(
        summary
            .reports
            .iter()
            .all(|r| r.outcome == TargetOutcome::Abandoned)
    );
    assert!(!summary.is_success());
}
