//! The fabric transport collaborator (spec §6 "Fabric").
//!
//! `FabricTransport` is the seam the migration engine sends wire messages
//! through. `InMemoryFabric` is a test double modeled on
//! `network/connection.rs::ConnectionRegistry`: one bounded channel per
//! destination node, non-blocking `try_send` semantics.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::wire::{MigrationChannel, MigrationMessage};

/// Outcome of a fabric send, matching the source's `AS_FABRIC_{SUCCESS,
/// CHANNEL_BUSY,NODE_ABSENT}` three-way result (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricSendResult {
    Ok,
    QueueFull,
    NoNode,
}

/// The transport seam the migration engine sends/receives over.
///
/// Handlers are registered out of band (the owning service wires incoming
/// `MigrationMessage`s to the emigration/immigration tables); this trait
/// only covers the outbound direction migration code actually calls.
#[async_trait]
pub trait FabricTransport: Send + Sync {
    /// Send `msg` to `node` on `channel`. Never blocks indefinitely: a full
    /// destination queue returns `QueueFull` immediately.
    async fn send(&self, node: &str, msg: MigrationMessage, channel: MigrationChannel) -> FabricSendResult;
}

const NODE_QUEUE_DEPTH: usize = 1024;

/// In-memory fabric test double. Each registered node has its own bounded
/// inbox; sends to unregistered nodes return `NoNode`.
pub struct InMemoryFabric {
    inboxes: DashMap<String, mpsc::Sender<MigrationMessage>>,
}

impl InMemoryFabric {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inboxes: DashMap::new(),
        }
    }

    /// Register `node`, returning the receiver end of its inbox.
    pub fn register_node(&self, node: impl Into<String>) -> mpsc::Receiver<MigrationMessage> {
        let (tx, rx) = mpsc::channel(NODE_QUEUE_DEPTH);
        self.inboxes.insert(node.into(), tx);
        rx
    }

    pub fn unregister_node(&self, node: &str) {
        self.inboxes.remove(node);
    }
}

impl Default for InMemoryFabric {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FabricTransport for InMemoryFabric {
    async fn send(&self, node: &str, msg: MigrationMessage, _channel: MigrationChannel) -> FabricSendResult {
        let Some(tx) = self.inboxes.get(node).map(|e| e.value().clone()) else {
            return FabricSendResult::NoNode;
        };
        match tx.try_send(msg) {
            Ok(()) => FabricSendResult::Ok,
            Err(mpsc::error::TrySendError::Full(_)) => FabricSendResult::QueueFull,
            Err(mpsc::error::TrySendError::Closed(_)) => FabricSendResult::NoNode,
        }
    }
}
