//! Domain service stubs.
//!
//! Each service implements both `ManagedService` (lifecycle) and `tower::Service<Operation>`
//! (request handling). All stubs return `OperationResponse::NotImplemented` -- actual
//! business logic will be implemented in per-domain specs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tower::Service;

use crate::service::operation::{
    service_names, Operation, OperationError, OperationResponse,
};
use crate::service::registry::{ManagedService, ServiceContext};

// ---------------------------------------------------------------------------
// Macro for repetitive stub implementations
// ---------------------------------------------------------------------------

/// Generate a domain service stub with the given name and service constant.
macro_rules! domain_stub {
    (
        $(#[$meta:meta])*
        $name:ident, $svc_name:expr
    ) => {
        $(#[$meta])*
        pub struct $name;

        #[async_trait]
        impl ManagedService for $name {
            fn name(&self) -> &'static str {
                $svc_name
            }

            async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
                Ok(())
            }

            async fn reset(&self) -> anyhow::Result<()> {
                Ok(())
            }

            async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
                Ok(())
            }
        }

        impl Service<Operation> for Arc<$name> {
            type Response = OperationResponse;
            type Error = OperationError;
            type Future =
                Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, op: Operation) -> Self::Future {
                let call_id = op.ctx().call_id;
                let name = $svc_name;
                Box::pin(async move {
                    Ok(OperationResponse::NotImplemented {
                        service_name: name,
                        call_id,
                    })
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Domain service stubs
// ---------------------------------------------------------------------------

domain_stub!(
    /// CRDT domain service (LWW-Map and OR-Map operations).
    CrdtService, service_names::CRDT
);

domain_stub!(
    /// Sync domain service (Merkle tree synchronization).
    SyncService, service_names::SYNC
);

domain_stub!(
    /// Query domain service (live query subscriptions).
    QueryService, service_names::QUERY
);

domain_stub!(
    /// Messaging domain service (topic pub/sub).
    MessagingService, service_names::MESSAGING
);

domain_stub!(
    /// Coordination domain service (locks, partition map, heartbeat).
    CoordinationService, service_names::COORDINATION
);

domain_stub!(
    /// Search domain service (full-text search).
    SearchService, service_names::SEARCH
);

domain_stub!(
    /// Persistence domain service (counters, entry processing, journal, resolvers).
    PersistenceService, service_names::PERSISTENCE
);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
