//! The emigration state machine (spec §4.4): sweeps a partition's records,
//! streams them to the destination as `INSERT`s, and retires only after
//! every insert has been acked and the destination has acked `DONE`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::migration::config::MigrationConfig;
use crate::migration::fabric::{FabricSendResult, FabricTransport};
use crate::migration::metrics::{MigrationEvent, MigrationMetrics};
use crate::migration::record::{PickledRecord, RecordKind};
use crate::migration::reinsert::ReinsertTable;
use crate::migration::wire::{
    DonePayload, InsertPayload, MigrationChannel, MigrationMessage, StartAckStatus, StartPayload,
};
use crate::storage::engine::StorageEngine;

/// Error taxonomy for the migration engine (spec §7). Wire-message handlers
/// never propagate these upward; only the emigration worker loop and the
/// public service API surface a `Result`.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("cluster key changed mid-migration: expected {expected}, saw {actual}")]
    ClusterKeyChanged { expected: u64, actual: u64 },
    #[error("no such node: {0}")]
    NoSuchNode(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("migration {emig_id} for partition {partition_id} aborted")]
    Aborted { emig_id: u64, partition_id: u32 },
    #[error("partition reservation failed for partition {0}")]
    ReservationFailed(u32),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Tracks which kind of record this emigration has sent so far.
///
/// Transitions are unidirectional: `None -> SubRecord -> Record`. Once a
/// top-level record has been sent, a sub-record/ESR must never follow
/// (spec invariant 4) because the destination has no way to re-open a
/// parent it already merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    None,
    SubRecord,
    Record,
}

impl TxState {
    /// Advance past sending a record of `kind`, or reject a regression.
    fn advance(self, kind: RecordKind) -> Result<TxState, MigrationError> {
        let wants_sub_record = kind.is_sub_record_tree();
        match (self, wants_sub_record) {
            (TxState::None, true) => Ok(TxState::SubRecord),
            (TxState::None, false) => Ok(TxState::Record),
            (TxState::SubRecord, true) => Ok(TxState::SubRecord),
            (TxState::SubRecord, false) => Ok(TxState::Record),
            (TxState::Record, true) => Err(MigrationError::MalformedMessage(
                "sub-record sent after a top-level record".into(),
            )),
            (TxState::Record, false) => Ok(TxState::Record),
        }
    }
}

/// What `handshake_start` learned once the destination's `StartAck` settled
/// on a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOutcome {
    Proceed,
    AlreadyDone,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Shared, `Arc`-held state for one outbound partition migration. Acks
/// arrive out of band (via the owning service dispatching inbound
/// `MigrationMessage`s) and are applied through the `on_*` methods, which
/// wake the worker loop blocked in `run`.
pub struct Emigration {
    pub emig_id: u64,
    pub partition_id: u32,
    pub cluster_key: u64,
    pub destination: String,
    reinsert: ReinsertTable,
    tx_state: std::sync::Mutex<TxState>,
    start_status: std::sync::Mutex<Option<StartAckStatus>>,
    done_acked: AtomicBool,
    cancelled: AtomicBool,
    next_insert_id: AtomicU64,
    notify: Notify,
}

impl Emigration {
    #[must_use]
    pub fn new(emig_id: u64, partition_id: u32, cluster_key: u64, destination: String) -> Arc<Self> {
        Arc::new(Self {
            emig_id,
            partition_id,
            cluster_key,
            destination,
            reinsert: ReinsertTable::new(),
            tx_state: std::sync::Mutex::new(TxState::None),
            start_status: std::sync::Mutex::new(None),
            done_acked: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            next_insert_id: AtomicU64::new(1),
            notify: Notify::new(),
        })
    }

    pub fn on_start_ack(&self, status: StartAckStatus) {
        *self.start_status.lock().unwrap() = Some(status);
        self.notify.notify_waiters();
    }

    /// The most recent `StartAck` status, if one has arrived yet.
    fn start_status(&self) -> Option<StartAckStatus> {
        *self.start_status.lock().unwrap()
    }

    pub fn on_insert_ack(&self, insert_id: u64) {
        self.reinsert.ack(insert_id);
        self.notify.notify_waiters();
    }

    pub fn on_done_ack(&self) {
        self.done_acked.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn bytes_emigrating(&self) -> u64 {
        self.reinsert.bytes_emigrating()
    }
}

/// Drive one emigration end to end: START handshake, tree sweep with
/// backpressure-bounded streaming and retransmit, drain the reinsert
/// table, DONE handshake.
pub async fn run(
    state: Arc<Emigration>,
    storage: Arc<dyn StorageEngine>,
    fabric: Arc<dyn FabricTransport>,
    metrics: Arc<MigrationMetrics>,
    config: Arc<MigrationConfig>,
) -> Result<(), MigrationError> {
    let span_partition = state.partition_id;
    info!(partition_id = span_partition, emig_id = state.emig_id, "emigration starting");

    match handshake_start(&state, &fabric, &metrics, &config).await? {
        StartOutcome::AlreadyDone => {
            info!(
                partition_id = span_partition,
                emig_id = state.emig_id,
                "destination already completed this migration; skipping record transfer"
            );
            return Ok(());
        }
        StartOutcome::Proceed => {}
    }

    let records = sweep_partition(&storage);
    send_records(&state, &fabric, &metrics, &config, records).await?;

    drain_reinsert_table(&state, &fabric, &config).await?;

    handshake_done(&state, &fabric, &config).await?;

    info!(partition_id = span_partition, emig_id = state.emig_id, "emigration complete");
    Ok(())
}

/// Read every entry currently in the partition's storage and pickle it,
/// sub-record-tree entries first (spec invariant 4). This flat storage
/// engine has no native parent/sub-record linkage, so every entry pickles
/// as `RecordKind::Normal`; the sort is a no-op today but keeps the
/// ordering contract explicit for when sub-record storage lands.
fn sweep_partition(storage: &Arc<dyn StorageEngine>) -> Vec<PickledRecord> {
    let mut records: Vec<PickledRecord> = storage
        .snapshot_iter()
        .into_iter()
        .map(|(key, record)| PickledRecord {
            digest: key.into_bytes(),
            generation: record.metadata.version,
            void_time: 0,
            last_update_time: record.metadata.last_update_time,
            record_buf: rmp_serde::to_vec_named(&record.value).unwrap_or_default(),
            rec_props: None,
            kind: RecordKind::Normal,
            linkage: None,
        })
        .collect();

    records.sort_by_key(|r| !r.is_sub_record_tree());
    records
}

async fn handshake_start(
    state: &Arc<Emigration>,
    fabric: &Arc<dyn FabricTransport>,
    metrics: &Arc<MigrationMetrics>,
    config: &MigrationConfig,
) -> Result<StartOutcome, MigrationError> {
    let payload = StartPayload {
        emig_id: state.emig_id,
        partition_id: state.partition_id,
        cluster_key: state.cluster_key,
    };

    loop {
        if state.is_cancelled() {
            return Err(MigrationError::Aborted {
                emig_id: state.emig_id,
                partition_id: state.partition_id,
            });
        }

        match state.start_status() {
            Some(StartAckStatus::Ok) => return Ok(StartOutcome::Proceed),
            Some(StartAckStatus::AlreadyDone) => return Ok(StartOutcome::AlreadyDone),
            Some(StartAckStatus::Fail) => {
                metrics.record_event(MigrationEvent::StartFailed);
                return Err(MigrationError::ReservationFailed(state.partition_id));
            }
            // EAGAIN and "no ack yet" both just mean: resend and wait.
            Some(StartAckStatus::Eagain) | None => {}
        }

        send_or_backoff(
            fabric,
            &state.destination,
            MigrationMessage::Start(payload.clone()),
            MigrationChannel::Ctrl,
            config,
        )
        .await?;

        wait_or_timeout(&state.notify, config.retransmit_startdone_ms).await;
    }
}

async fn send_records(
    state: &Arc<Emigration>,
    fabric: &Arc<dyn FabricTransport>,
    metrics: &Arc<MigrationMetrics>,
    config: &MigrationConfig,
    records: Vec<PickledRecord>,
) -> Result<(), MigrationError> {
    for record in records {
        if state.is_cancelled() {
            return Err(MigrationError::Aborted {
                emig_id: state.emig_id,
                partition_id: state.partition_id,
            });
        }

        {
            let mut tx_state = state.tx_state.lock().unwrap();
            *tx_state = tx_state.advance(record.kind)?;
        }

        while state.bytes_emigrating() >= config.max_bytes_emigrating {
            if state.is_cancelled() {
                return Err(MigrationError::Aborted {
                    emig_id: state.emig_id,
                    partition_id: state.partition_id,
                });
            }
            tokio::time::sleep(std::time::Duration::from_millis(config.backpressure_poll_ms)).await;
        }

        if record.has_empty_bins() {
            debug!(partition_id = state.partition_id, "skipping record with empty bins");
            continue;
        }

        let insert_id = state.next_insert_id.fetch_add(1, Ordering::AcqRel);
        let size = record.estimated_size();
        let payload = InsertPayload {
            emig_id: state.emig_id,
            partition_id: state.partition_id,
            cluster_key: state.cluster_key,
            insert_id,
            record,
        };

        state.reinsert.put(payload.clone(), size, now_ms());
        send_or_backoff(
            fabric,
            &state.destination,
            MigrationMessage::Insert(payload),
            MigrationChannel::Bulk,
            config,
        )
        .await?;
        metrics.tx_object();

        if config.migrate_sleep_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(config.migrate_sleep_ms)).await;
        }
    }

    Ok(())
}

async fn drain_reinsert_table(
    state: &Arc<Emigration>,
    fabric: &Arc<dyn FabricTransport>,
    config: &MigrationConfig,
) -> Result<(), MigrationError> {
    loop {
        if state.is_cancelled() {
            return Err(MigrationError::Aborted {
                emig_id: state.emig_id,
                partition_id: state.partition_id,
            });
        }
        if state.reinsert.is_empty() {
            return Ok(());
        }

        let due = state
            .reinsert
            .due_for_retransmit(now_ms(), config.retransmit_ms as i64);
        for msg in due {
            send_or_backoff(fabric, &state.destination, msg, MigrationChannel::Bulk, config).await?;
        }

        wait_or_timeout(&state.notify, config.reinsert_sweep_interval_ms).await;
    }
}

async fn handshake_done(
    state: &Arc<Emigration>,
    fabric: &Arc<dyn FabricTransport>,
    config: &MigrationConfig,
) -> Result<(), MigrationError> {
    let payload = DonePayload {
        emig_id: state.emig_id,
        partition_id: state.partition_id,
        cluster_key: state.cluster_key,
    };

    loop {
        if state.is_cancelled() {
            return Err(MigrationError::Aborted {
                emig_id: state.emig_id,
                partition_id: state.partition_id,
            });
        }
        if state.done_acked.load(Ordering::Acquire) {
            return Ok(());
        }

        send_or_backoff(
            fabric,
            &state.destination,
            MigrationMessage::Done(payload.clone()),
            MigrationChannel::Ctrl,
            config,
        )
        .await?;

        wait_or_timeout(&state.notify, config.retransmit_startdone_ms).await;
    }
}

async fn send_or_backoff(
    fabric: &Arc<dyn FabricTransport>,
    destination: &str,
    msg: MigrationMessage,
    channel: MigrationChannel,
    config: &MigrationConfig,
) -> Result<(), MigrationError> {
    loop {
        match fabric.send(destination, msg.clone(), channel).await {
            FabricSendResult::Ok => return Ok(()),
            FabricSendResult::QueueFull => {
                tokio::time::sleep(std::time::Duration::from_millis(config.queue_full_backoff_ms)).await;
            }
            FabricSendResult::NoNode => {
                warn!(destination, "fabric send found no such node");
                return Err(MigrationError::NoSuchNode(destination.to_string()));
            }
        }
    }
}

/// Wait for a notification or `timeout_ms`, whichever comes first —
/// the shared suspension point every handshake/retransmit loop blocks on.
async fn wait_or_timeout(notify: &Notify, timeout_ms: u64) {
    let _ = tokio::time::timeout(
        std::time::Duration::from_millis(timeout_ms.max(1)),
        notify.notified(),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_state_allows_sub_record_then_record() {
        let state = TxState::None;
        let state = state.advance(RecordKind::SubRecord).unwrap();
        assert_eq!(state, TxState::SubRecord);
        let state = state.advance(RecordKind::Esr).unwrap();
        assert_eq!(state, TxState::SubRecord);
        let state = state.advance(RecordKind::Normal).unwrap();
        assert_eq!(state, TxState::Record);
    }

    #[test]
    fn tx_state_rejects_sub_record_after_record() {
        let state = TxState::None.advance(RecordKind::Normal).unwrap();
        assert_eq!(state, TxState::Record);
        let err = state.advance(RecordKind::SubRecord);
        assert!(err.is_err());
    }

    #[test]
    fn tx_state_allows_normal_only_sweep() {
        let state = TxState::None.advance(RecordKind::Normal).unwrap();
        let state = state.advance(RecordKind::Normal).unwrap();
        assert_eq!(state, TxState::Record);
    }

    #[tokio::test]
    async fn emigration_tracks_acks_and_cancellation() {
        let emig = Emigration::new(1, 0, 42, "node-b".to_string());
        assert!(!emig.is_cancelled());

        emig.on_start_ack(StartAckStatus::Ok);
        assert_eq!(emig.start_status(), Some(StartAckStatus::Ok));

        emig.cancel();
        assert!(emig.is_cancelled());
    }
}
