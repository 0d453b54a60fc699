//! Driver seam: the pool and connector traits the manager is built on.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DriverError;

/// Which endpoint a pool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Replica,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool bounds handed to a [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub max_open_connections: u32,
    pub max_idle_connections: u32,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
    /// Upper bound on establishing or acquiring a connection
    pub connect_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_open_connections: 25,
            max_idle_connections: 10,
            max_lifetime: Duration::from_secs(300),
            max_idle_time: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Point-in-time pool metrics.
///
/// Only counters live here; connection strings never do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_open_connections: u32,
    pub open_connections: u32,
    pub in_use: u32,
    pub idle: u32,
    pub wait_count: u64,
    pub wait_duration_ms: u64,
    pub max_idle_closed: u64,
    pub max_idle_time_closed: u64,
    pub max_lifetime_closed: u64,
}

/// A pooled connection to one database endpoint.
///
/// Implementations must be safe for concurrent use and cheap to clone;
/// clones share the same underlying pool.
#[async_trait]
pub trait Pool: Clone + Send + Sync + 'static {
    /// Open transaction owned by exactly one caller.
    type Tx: Send + 'static;

    /// Short name of the backend, for logs.
    fn backend(&self) -> &'static str;

    /// Lightweight round-trip confirming the endpoint is reachable.
    async fn ping(&self) -> Result<(), DriverError>;

    async fn begin(&self) -> Result<Self::Tx, DriverError>;

    /// Begin a transaction in which writes are rejected by the database.
    async fn begin_read_only(&self) -> Result<Self::Tx, DriverError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), DriverError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), DriverError>;

    fn stats(&self) -> PoolStats;

    /// Reject new work and drop idle connections.
    ///
    /// Connections still checked out are discarded when they come back.
    /// Whether this call waits for them is up to the backend.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Opens pools for a given backend.
#[async_trait]
pub trait Connector: Send + Sync {
    type Pool: Pool;

    /// Open a pool and verify the endpoint with one round-trip.
    async fn connect(
        &self,
        role: Role,
        url: &str,
        options: &PoolOptions,
    ) -> Result<Self::Pool, DriverError>;
}

/// A pool handed out by the manager, tagged with the endpoint it serves.
#[derive(Clone)]
pub struct DbHandle<P> {
    role: Role,
    pool: P,
}

impl<P> DbHandle<P> {
    pub(crate) fn new(role: Role, pool: P) -> Self {
        Self { role, pool }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_replica(&self) -> bool {
        self.role == Role::Replica
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn into_inner(self) -> P {
        self.pool
    }
}

impl<P> Deref for DbHandle<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.pool
    }
}

impl<P> fmt::Debug for DbHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbHandle").field("role", &self.role).finish()
    }
}

/// Hide the password portion of a connection URL.
pub fn mask_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if let Some(colon_pos) = url.get(scheme_end..at_pos).and_then(|s| s.find(':')) {
            let colon_pos = scheme_end + colon_pos;
            let prefix = &url[..colon_pos + 1];
            let suffix = &url[at_pos..];
            return format!("{}***{}", prefix, suffix);
        }
    }
    url.to_string()
}
