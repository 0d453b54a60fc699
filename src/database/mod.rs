//! Database resilience layer.
//!
//! - `driver`: pool and connector traits, endpoint roles, pool stats
//! - `manager`: primary/replica routing, health, stats and lifecycle
//! - `health`: endpoint health tracking and the background checker
//! - `retry`: bounded retry with linear backoff
//! - `transaction`: commit/rollback scope
//! - `migrate`: schema migration capability
//! - `memory`: in-process backend

pub mod config;
pub mod driver;
pub mod health;
pub mod manager;
pub mod memory;
pub mod migrate;
pub mod retry;
pub mod transaction;

pub use config::ManagerConfig;
pub use driver::{mask_url, Connector, DbHandle, Pool, PoolOptions, PoolStats, Role};
pub use health::{EndpointHealthStats, EndpointReport, EndpointStatus, HealthReport};
pub use manager::{DatabaseManager, DatabaseStats};
pub use memory::{MemoryConnector, MemoryDatabase, MemoryPool, MemoryTransaction};
pub use migrate::{Column, Migratable, TableSchema};
pub use retry::{LinearBackoff, RetryPolicy};
pub use transaction::TxScope;
