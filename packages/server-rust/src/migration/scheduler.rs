//! Fixed-size worker pool that pops emigration candidates off a priority
//! queue and drives each one to completion (spec §4.6).

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cluster::types::MigrationTask;

/// Scheduling priority. `High` candidates always pop before `Low` ones,
/// matching the source's split queue for backup-promotion migrations vs.
/// ordinary rebalance migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    High,
}

/// One emigration candidate waiting to be picked up by a worker.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub task: MigrationTask,
    pub priority: Priority,
    /// Lower pops first within the same priority tier.
    pub migrate_order: u32,
    pub tree_elements: usize,
    pub cluster_key: u64,
}

impl Candidate {
    /// `true` if this candidate should be skipped rather than run: an
    /// empty tree has nothing to emigrate, and a stale cluster key means
    /// the rebalance that produced it has already been superseded.
    #[must_use]
    pub fn is_stale_or_empty(&self, current_cluster_key: u64) -> bool {
        self.tree_elements == 0 || self.cluster_key != current_cluster_key
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.migrate_order == other.migrate_order
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// `BinaryHeap` is a max-heap; invert `migrate_order` so the smallest
    /// value (highest actual priority) pops first, after tier.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.migrate_order.cmp(&self.migrate_order))
    }
}

pub type Handler = Arc<dyn Fn(Candidate) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// The priority queue plus the wakeup each idle worker blocks on.
pub struct EmigrationScheduler {
    queue: Mutex<BinaryHeap<Candidate>>,
    notify: Notify,
    shutting_down: AtomicBool,
}

impl EmigrationScheduler {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Queue a candidate and wake one idle worker.
    pub fn submit(&self, candidate: Candidate) {
        self.queue.lock().push(candidate);
        self.notify.notify_one();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Pop the highest-priority candidate, waiting for one to arrive.
    /// Returns `None` once shutdown has been requested and the queue has
    /// drained — the sentinel every worker checks to exit its loop.
    async fn pop(&self) -> Option<Candidate> {
        loop {
            if let Some(candidate) = self.queue.lock().pop() {
                return Some(candidate);
            }
            if self.shutting_down.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Signal every worker to exit once the queue drains, and wake them
    /// so a blocked `pop` notices.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// Spawn `n_workers` tasks, each looping: pop a candidate, skip it if
/// stale/empty against `current_cluster_key`, otherwise run `handler`.
pub fn spawn_workers(
    scheduler: Arc<EmigrationScheduler>,
    n_workers: u32,
    current_cluster_key: Arc<dyn Fn() -> u64 + Send + Sync>,
    handler: Handler,
) -> Vec<JoinHandle<()>> {
    (0..n_workers.max(1))
        .map(|worker_id| {
            let scheduler = scheduler.clone();
            let current_cluster_key = current_cluster_key.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                info!(worker_id, "emigration worker started");
                while let Some(candidate) = scheduler.pop().await {
                    if candidate.is_stale_or_empty(current_cluster_key()) {
                        debug!(
                            partition_id = candidate.task.partition_id,
                            "skipping stale or empty emigration candidate"
                        );
                        continue;
                    }
                    handler(candidate).await;
                }
                info!(worker_id, "emigration worker stopped");
            })
        })
        .collect()
}
