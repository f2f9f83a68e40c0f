//! Partition migration: emigration (sender) and immigration (receiver).
//!
//! A migration moves one partition's records from a source node to a
//! destination node without an owning-node handoff window where the data
//! is unavailable: the destination starts accepting writes for the
//! partition as soon as it has merged every record the source sends, and
//! the replica-write interlock in [`interlock`] guarantees a record that
//! arrives both ways (migrated, and via a concurrent ordinary write)
//! converges to the same value.

pub mod config;
pub mod emigration;
pub mod fabric;
pub mod immigration;
pub mod interlock;
pub mod metrics;
pub mod reaper;
pub mod record;
pub mod reinsert;
pub mod scheduler;
pub mod service;
pub mod wire;


pub use config::MigrationConfig;
pub use emigration::{Emigration, MigrationError, TxState};
pub use fabric::{FabricSendResult, FabricTransport, InMemoryFabric};
pub use immigration::{Immigration, ImmigrationHash, ImmigrationKey};
pub use interlock::{merge_record, normalize_generation, MergeOutcome};
pub use metrics::{MigrationEvent, MigrationMetrics, MigrationStats};
pub use record::{PickledRecord, RecordKind, SubRecordLinkage};
pub use reinsert::ReinsertTable;
pub use scheduler::{Candidate, EmigrationScheduler, Handler as EmigrationWorkerHandler, Priority};
pub use service::MigrationServiceImpl;
pub use wire::MigrationMessage;
