//! `TopGun` Server — `WebSocket` server with clustering, partitioning, and `PostgreSQL` storage.

pub mod cluster;
pub mod migration;
pub mod network;
pub mod service;
pub mod storage;
pub mod traits;

pub use migration::{Emigration, Immigration, MigrationConfig, MigrationError, MigrationServiceImpl};
pub use service::{
    CallerOrigin, ManagedService, Operation, OperationContext, OperationError, OperationResponse,
    OperationService, OperationRouter, ServerConfig, ServiceContext, ServiceRegistry,
};
pub use traits::{MapProvider, SchemaProvider, ServerStorage};
