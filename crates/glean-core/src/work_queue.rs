//! In-memory FIFO of pending targets plus the join barrier the pool waits on.
//!
//! Targets travel through the queue by value: `pop` hands ownership to one
//! worker and `requeue` hands it back. This is the only synchronization
//! protecting a target's state, so never clone a `Target` out of the queue or
//! keep a reference to it after requeueing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::target::Target;

struct QueueInner {
    targets: Mutex<VecDeque<Target>>,
    /// Signalled on push and on close.
    available: Notify,
    /// Seeded targets that have not reached a terminal state yet.
    outstanding: AtomicUsize,
    /// Signalled when `outstanding` drops to zero.
    settled: Notify,
    closed: AtomicBool,
}

/// Cloneable handle to a shared work queue.
///
/// A queue serves one run. Once the last seeded target settles (or `close`
/// is called) it stays closed: `pop` returns `None` from then on, and targets
/// seeded afterwards are only reachable through `drain`.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                targets: Mutex::new(VecDeque::new()),
                available: Notify::new(),
                outstanding: AtomicUsize::new(0),
                settled: Notify::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn lock_targets(&self) -> MutexGuard<'_, VecDeque<Target>> {
        self.inner.targets.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned work queue mutex");
            poisoned.into_inner()
        })
    }

    /// Enqueue a new target and count it against the join barrier.
    ///
    /// On a closed queue the target is kept for `drain` but not counted, so
    /// `join` cannot wait on work no worker will pop.
    pub fn seed(&self, target: Target) {
        if self.is_closed() {
            tracing::warn!(
                url = %target.source().url,
                "Seeding a closed work queue; target will not be processed"
            );
            self.lock_targets().push_back(target);
            return;
        }
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        self.push(target);
    }

    /// Put a target that still needs work at the back of the queue.
    pub fn requeue(&self, target: Target) {
        self.push(target);
    }

    fn push(&self, target: Target) {
        self.lock_targets().push_back(target);
        self.inner.available.notify_one();
    }

    /// Take the next target, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn pop(&self) -> Option<Target> {
        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if self.is_closed() {
                return None;
            }
            if let Some(target) = self.lock_targets().pop_front() {
                return Some(target);
            }

            notified.await;
        }
    }

    /// Mark one seeded target as finished (persisted or failed).
    ///
    /// When the last one settles the barrier opens and the queue closes.
    pub fn settle(&self) {
        let previous = self
            .inner
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.inner.settled.notify_waiters();
                self.close();
            }
            Ok(_) => {}
            Err(_) => tracing::warn!("settle() called with no outstanding targets"),
        }
    }

    /// Wait until every seeded target has settled.
    pub async fn join(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Stop handing out work and wake every waiting worker.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Remove and return every target still waiting in the queue.
    pub fn drain(&self) -> Vec<Target> {
        self.lock_targets().drain(..).collect()
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock_targets().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
