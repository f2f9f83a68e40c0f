//! Observability for the migration subsystem (spec §6 minimum counter set).
//!
//! A single handle with one `record_event` entry point, replacing the
//! scattered macro-driven stats blocks the source uses per design note
//! "Macro-driven stats blocks" — one place that knows how migration
//! activity is counted.

use std::sync::atomic::{AtomicU64, Ordering};

/// What kind of migration activity occurred, passed to `record_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationEvent {
    TxObjectSent,
    RxObjectReceived,
    MsgSent,
    MsgReceived,
    EmigrationStarted,
    EmigrationCompleted,
    ImmigrationStarted,
    ImmigrationCompleted,
    /// A `START` handshake was refused with `START_ACK_FAIL` (spec §7
    /// "fatal-to-operation"); the emigration aborts and the partition
    /// counts against the imbalance counter.
    StartFailed,
}

/// Plain counters mirroring `cluster::types::ClusterHealth`'s
/// plain-struct-of-counters shape, snapshotted for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStats {
    pub migrate_tx_object_count: u64,
    pub migrate_rx_object_count: u64,
    pub migrate_progress_send: u64,
    pub migrate_progress_recv: u64,
    pub migrate_msgs_sent: u64,
    pub migrate_msgs_rcvd: u64,
    pub migrate_tx_partitions_imbalance: u64,
}

/// Migration subsystem observability handle. Cheap to clone (all fields
/// are atomics behind an `Arc` held by the owner); every counting method
/// funnels through `record_event`.
#[derive(Debug, Default)]
pub struct MigrationMetrics {
    migrate_tx_object_count: AtomicU64,
    migrate_rx_object_count: AtomicU64,
    migrate_progress_send: AtomicU64,
    migrate_progress_recv: AtomicU64,
    migrate_msgs_sent: AtomicU64,
    migrate_msgs_rcvd: AtomicU64,
    migrate_tx_partitions_imbalance: AtomicU64,
}

impl MigrationMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single entry point for every migration counter update.
    pub fn record_event(&self, event: MigrationEvent) {
        match event {
            MigrationEvent::TxObjectSent => {
                self.migrate_tx_object_count.fetch_add(1, Ordering::Relaxed);
            }
            MigrationEvent::RxObjectReceived => {
                self.migrate_rx_object_count.fetch_add(1, Ordering::Relaxed);
            }
            MigrationEvent::MsgSent => {
                self.migrate_msgs_sent.fetch_add(1, Ordering::Relaxed);
            }
            MigrationEvent::MsgReceived => {
                self.migrate_msgs_rcvd.fetch_add(1, Ordering::Relaxed);
            }
            MigrationEvent::EmigrationStarted => {
                self.migrate_progress_send.fetch_add(1, Ordering::Relaxed);
            }
            MigrationEvent::EmigrationCompleted => {
                self.migrate_progress_send.fetch_sub(1, Ordering::Relaxed);
            }
            MigrationEvent::ImmigrationStarted => {
                self.migrate_progress_recv.fetch_add(1, Ordering::Relaxed);
            }
            MigrationEvent::ImmigrationCompleted => {
                self.migrate_progress_recv.fetch_sub(1, Ordering::Relaxed);
            }
            MigrationEvent::StartFailed => {
                self.migrate_tx_partitions_imbalance.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Convenience wrapper used on the emigration hot path.
    pub fn tx_object(&self) {
        self.record_event(MigrationEvent::TxObjectSent);
    }

    /// Convenience wrapper used on the immigration hot path.
    pub fn rx_object(&self) {
        self.record_event(MigrationEvent::RxObjectReceived);
    }

    #[must_use]
    pub fn snapshot(&self) -> MigrationStats {
        MigrationStats {
            migrate_tx_object_count: self.migrate_tx_object_count.load(Ordering::Relaxed),
            migrate_rx_object_count: self.migrate_rx_object_count.load(Ordering::Relaxed),
            migrate_progress_send: self.migrate_progress_send.load(Ordering::Relaxed),
            migrate_progress_recv: self.migrate_progress_recv.load(Ordering::Relaxed),
            migrate_msgs_sent: self.migrate_msgs_sent.load(Ordering::Relaxed),
            migrate_msgs_rcvd: self.migrate_msgs_rcvd.load(Ordering::Relaxed),
            migrate_tx_partitions_imbalance: self
                .migrate_tx_partitions_imbalance
                .load(Ordering::Relaxed),
        }
    }
}
