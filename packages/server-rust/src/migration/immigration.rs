//! Immigration acceptance (spec §4.5): accepts `START`/`INSERT`/`DONE` from
//! an emigrating source and merges incoming records against local state.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::migration::interlock::{merge_record, normalize_generation, MergeOutcome};
use crate::migration::metrics::MigrationMetrics;
use crate::migration::record::PickledRecord;
use crate::migration::wire::StartAckStatus;
use crate::storage::engine::StorageEngine;
use crate::storage::record::{Record, RecordMetadata};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Key an immigration is addressed by: the source node and its emig id.
/// A given source may run at most one emigration per partition at a time,
/// but the same `(source, emig_id)` pair must never collide across
/// partitions, so both are part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImmigrationKey {
    pub source: String,
    pub emig_id: u64,
}

/// Per-immigration bookkeeping, created on the first `START` seen for a
/// given `(source, emig_id)` and retired by the reaper after `DONE`.
pub struct Immigration {
    pub source: String,
    pub emig_id: u64,
    pub partition_id: u32,
    pub cluster_key: u64,
    /// Set once the winning `DONE` has been processed; `0` means not done.
    done_at_ms: AtomicI64,
    started_at_ms: i64,
    done_seen: AtomicBool,
}

impl Immigration {
    #[must_use]
    pub fn new(source: String, emig_id: u64, partition_id: u32, cluster_key: u64) -> Self {
        Self {
            source,
            emig_id,
            partition_id,
            cluster_key,
            done_at_ms: AtomicI64::new(0),
            started_at_ms: now_ms(),
            done_seen: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done_seen.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn done_at_ms(&self) -> i64 {
        self.done_at_ms.load(Ordering::Acquire)
    }

    fn mark_done(&self) {
        self.done_seen.store(true, Ordering::Release);
        self.done_at_ms.store(now_ms(), Ordering::Release);
    }
}

/// The `(source, emig_id) -> Immigration` table plus the auxiliary
/// `partition_id -> receiving-count` index the replica-write path
/// consults to know whether a partition is currently immigrating.
///
/// Grounded on `cluster::state::ClusterState`'s mix of `DashMap` for hot
/// per-entry access and a `tokio::sync::RwLock`-guarded table for the
/// rarer, whole-table operation (here, the reaper's sweep).
pub struct ImmigrationHash {
    table: RwLock<DashMap<ImmigrationKey, Arc<Immigration>>>,
    receiving_partitions: DashMap<u32, u32>,
}

impl ImmigrationHash {
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: RwLock::new(DashMap::new()),
            receiving_partitions: DashMap::new(),
        }
    }

    /// `true` if any immigration is currently in flight for `partition_id`.
    #[must_use]
    pub fn is_receiving(&self, partition_id: u32) -> bool {
        self.receiving_partitions
            .get(&partition_id)
            .is_some_and(|count| *count > 0)
    }

    /// Look up an existing entry without creating one.
    async fn get(&self, key: &ImmigrationKey) -> Option<Arc<Immigration>> {
        let table = self.table.read().await;
        table.get(key).map(|entry| entry.clone())
    }

    async fn insert_unique(&self, key: ImmigrationKey, partition_id: u32, cluster_key: u64) -> Arc<Immigration> {
        let table = self.table.read().await;
        if let Some(existing) = table.get(&key) {
            return existing.clone();
        }
        drop(table);

        let table = self.table.write().await;
        let entry = table
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Immigration::new(key.source.clone(), key.emig_id, partition_id, cluster_key)));
        let immigration = entry.clone();
        drop(entry);
        drop(table);

        *self
            .receiving_partitions
            .entry(partition_id)
            .or_insert(0) += 1;
        immigration
    }

    async fn remove(&self, key: &ImmigrationKey, partition_id: u32) {
        let table = self.table.write().await;
        if table.remove(key).is_some() {
            if let Some(mut count) = self.receiving_partitions.get_mut(&partition_id) {
                *count = count.saturating_sub(1);
            }
        }
    }

    /// Sweep entries whose `done_at_ms` is older than `migrate_rx_lifetime_ms`.
    /// `migrate_rx_lifetime_ms == 0` retires immediately on the winning
    /// `DONE` rather than waiting for a sweep (spec §9 Open Question,
    /// preserved exactly).
    pub async fn reap_expired(&self, migrate_rx_lifetime_ms: u64) {
        let now = now_ms();
        let expired: Vec<(ImmigrationKey, u32)> = {
            let table = self.table.read().await;
            table
                .iter()
                .filter(|entry| {
                    let imm = entry.value();
                    imm.is_done()
                        && (migrate_rx_lifetime_ms == 0
                            || now - imm.done_at_ms() >= migrate_rx_lifetime_ms as i64)
                })
                .map(|entry| (entry.key().clone(), entry.value().partition_id))
                .collect()
        };

        for (key, partition_id) in expired {
            self.remove(&key, partition_id).await;
        }
    }

    /// Drop every tracked immigration. Used by `ManagedService::reset`.
    pub async fn clear(&self) {
        let table = self.table.write().await;
        table.clear();
        drop(table);
        self.receiving_partitions.clear();
    }
}

impl Default for ImmigrationHash {
    fn default() -> Self {
        Self::new()
    }
}

/// The rebalance collaborator's admission decision for an incoming `START`
/// (spec §4.5 point 2, §6 `rx_allow(ns, pid, cluster_key, src)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxAllow {
    Ok,
    Again,
    Fail,
    AlreadyDone,
}

/// Decide whether to admit a `START`.
///
/// A cluster-key mismatch replies `AGAIN` rather than refusing outright —
/// the sender may simply be ahead (spec §4.5 point 1): `START` carries no
/// retry budget of its own, so the sender keeps resending under its own
/// view until the keys agree or its own cluster-key check aborts it
/// locally. A `START` for an `(source, emig_id)` this node already
/// completed gets `ALREADY_DONE` so a late retransmit short-circuits
/// without re-running the migration. A concurrent, distinct immigration
/// already in flight for the same partition gets `AGAIN` (partition
/// busy). A malformed `emig_id` (spec §7's "missing required field") is
/// the one `FAIL` case this collaborator can detect on its own; anything
/// else reaching `FAIL` comes from rejecting an unexpected partition
/// state once partition assignment is threaded through here.
async fn rx_allow(
    hash: &ImmigrationHash,
    source: &str,
    emig_id: u64,
    partition_id: u32,
    cluster_key: u64,
    expected_cluster_key: u64,
) -> RxAllow {
    if emig_id == 0 {
        return RxAllow::Fail;
    }
    if cluster_key != expected_cluster_key {
        return RxAllow::Again;
    }

    let key = ImmigrationKey {
        source: source.to_string(),
        emig_id,
    };
    if let Some(existing) = hash.get(&key).await {
        return if existing.is_done() {
            RxAllow::AlreadyDone
        } else {
            RxAllow::Ok
        };
    }

    if hash.is_receiving(partition_id) {
        return RxAllow::Again;
    }

    RxAllow::Ok
}

/// Accept a `START`: ask `rx_allow` whether to admit it, reserving a new
/// immigration entry only on `OK`. Idempotent — a retransmitted `START`
/// must not spawn a second entry (spec §4.5 point 1).
pub async fn handle_start(
    hash: &ImmigrationHash,
    source: String,
    emig_id: u64,
    partition_id: u32,
    cluster_key: u64,
    expected_cluster_key: u64,
) -> StartAckStatus {
    match rx_allow(hash, &source, emig_id, partition_id, cluster_key, expected_cluster_key).await {
        RxAllow::Fail => StartAckStatus::Fail,
        RxAllow::Again => StartAckStatus::Eagain,
        RxAllow::AlreadyDone => StartAckStatus::AlreadyDone,
        RxAllow::Ok => {
            let key = ImmigrationKey {
                source: source.clone(),
                emig_id,
            };
            hash.insert_unique(key, partition_id, cluster_key).await;
            info!(partition_id, emig_id, source = %source, "immigration accepted START");
            StartAckStatus::Ok
        }
    }
}

/// Accept one `INSERT`: normalize its generation, merge it against
/// whatever is locally stored at its digest, and apply the winner.
pub async fn handle_insert(
    storage: &Arc<dyn StorageEngine>,
    metrics: &MigrationMetrics,
    mut record: PickledRecord,
) -> MergeOutcome {
    record.generation = normalize_generation(record.generation);

    if record.has_empty_bins() {
        warn!("dropping migrated record with empty bins");
        return MergeOutcome::Superseded;
    }

    let key = String::from_utf8_lossy(&record.digest).into_owned();
    let existing = storage.get(&key);
    let outcome = merge_record(&record, existing.as_ref().map(|r| &r.metadata), false);

    if outcome == MergeOutcome::Applied {
        let value = rmp_serde::from_slice(&record.record_buf);
        if let Ok(value) = value {
            let mut metadata = RecordMetadata::new(now_ms(), record.record_buf.len() as u64);
            metadata.version = record.generation;
            metadata.last_update_time = record.last_update_time;
            storage.put(&key, Record { value, metadata });
            metrics.rx_object();
        } else {
            warn!(digest = %key, "dropped malformed migrated record buf");
        }
    }

    outcome
}

/// Accept a `DONE`: mark the immigration complete. Idempotent — a
/// retransmitted `DONE` after the winning one is acked again with no
/// further side effect (spec §4.5 point 1, §9 Open Question).
pub async fn handle_done(
    hash: &ImmigrationHash,
    source: &str,
    emig_id: u64,
) -> bool {
    let key = ImmigrationKey {
        source: source.to_string(),
        emig_id,
    };
    let table = hash.table.read().await;
    if let Some(entry) = table.get(&key) {
        if !entry.is_done() {
            entry.mark_done();
            info!(emig_id, source, "immigration DONE");
        }
        true
    } else {
        false
    }
}
