//! The per-record migration wire protocol (spec §4.1 "MIGRATE" message).
//!
//! Distinct from `cluster::messages::ClusterMessage`'s coarser
//! `MigrateStart`/`MigrateData`/`MigrateReady`/`MigrateFinalize` variants,
//! which remain the control-plane signal. This is the dedicated sparse
//! per-record stream: START/INSERT/DONE and their acks.

use serde::{Deserialize, Serialize};

use super::record::PickledRecord;

/// Fabric priority channel a migration message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationChannel {
    /// Control messages: START/DONE and their acks.
    Ctrl,
    /// Bulk record transfer: INSERT and its ack.
    Bulk,
}

/// Payload of a `Start` message: announces an emigration is beginning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub emig_id: u64,
    pub partition_id: u32,
    pub cluster_key: u64,
}

/// The receiver's admission decision for a `START`, carried back on its ack
/// (spec §4.1's `START_ACK_{OK,EAGAIN,FAIL,ALREADY_DONE}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartAckStatus {
    /// Admitted; the sender should proceed with the record sweep.
    Ok,
    /// Transient refusal (cluster-key mismatch, partition busy); sleep and
    /// re-send `START` unchanged.
    Eagain,
    /// Terminal refusal; the emigration must abort.
    Fail,
    /// This `(source, emig_id)` already ran to completion on the receiver;
    /// terminate as success without sending any `INSERT`.
    AlreadyDone,
}

/// Payload of a `StartAck` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAckPayload {
    pub emig_id: u64,
    pub partition_id: u32,
    pub status: StartAckStatus,
}

/// Payload of an `Insert` message carrying one pickled record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertPayload {
    pub emig_id: u64,
    pub partition_id: u32,
    pub cluster_key: u64,
    /// Monotone id within this emigration, used to match the ack and to
    /// key the reinsert table.
    pub insert_id: u64,
    pub record: PickledRecord,
}

/// Payload of an `InsertAck` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAckPayload {
    pub emig_id: u64,
    pub partition_id: u32,
    pub insert_id: u64,
}

/// Payload of a `Done` message: all records for this partition have been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonePayload {
    pub emig_id: u64,
    pub partition_id: u32,
    pub cluster_key: u64,
}

/// Payload of a `DoneAck` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneAckPayload {
    pub emig_id: u64,
    pub partition_id: u32,
}

/// The per-record migration wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationMessage {
    Start(StartPayload),
    StartAck(StartAckPayload),
    Insert(InsertPayload),
    InsertAck(InsertAckPayload),
    Done(DonePayload),
    DoneAck(DoneAckPayload),
}

impl MigrationMessage {
    /// Which fabric channel this message type travels on.
    #[must_use]
    pub fn channel(&self) -> MigrationChannel {
        match self {
            MigrationMessage::Insert(_) | MigrationMessage::InsertAck(_) => {
                MigrationChannel::Bulk
            }
            _ => MigrationChannel::Ctrl,
        }
    }

    /// The emigration id this message belongs to.
    #[must_use]
    pub fn emig_id(&self) -> u64 {
        match self {
            MigrationMessage::Start(p) => p.emig_id,
            MigrationMessage::StartAck(p) => p.emig_id,
            MigrationMessage::Insert(p) => p.emig_id,
            MigrationMessage::InsertAck(p) => p.emig_id,
            MigrationMessage::Done(p) => p.emig_id,
            MigrationMessage::DoneAck(p) => p.emig_id,
        }
    }

    /// The partition id this message belongs to.
    #[must_use]
    pub fn partition_id(&self) -> u32 {
        match self {
            MigrationMessage::Start(p) => p.partition_id,
            MigrationMessage::StartAck(p) => p.partition_id,
            MigrationMessage::Insert(p) => p.partition_id,
            MigrationMessage::InsertAck(p) => p.partition_id,
            MigrationMessage::Done(p) => p.partition_id,
            MigrationMessage::DoneAck(p) => p.partition_id,
        }
    }
}
