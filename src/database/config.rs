//! Immutable configuration for a [`DatabaseManager`](super::DatabaseManager).

use std::fmt;
use std::time::Duration;

use crate::config::Settings;

use super::driver::{mask_url, PoolOptions};
use super::retry::RetryPolicy;

/// Everything the manager needs, fixed at construction.
#[derive(Clone)]
pub struct ManagerConfig {
    pub database_url: String,
    /// Read replica; `None` routes every read to the primary
    pub replica_url: Option<String>,
    pub max_open_connections: u32,
    pub max_idle_connections: u32,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub slow_threshold: Duration,
}

impl ManagerConfig {
    /// Defaults with the given primary URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn with_replica(mut self, replica_url: impl Into<String>) -> Self {
        self.replica_url = Some(replica_url.into());
        self
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_open_connections: self.max_open_connections.max(1),
            max_idle_connections: self.max_idle_connections.min(self.max_open_connections),
            max_lifetime: self.max_lifetime,
            max_idle_time: self.max_idle_time,
            connect_timeout: self.health_check_timeout,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_interval)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            replica_url: None,
            max_open_connections: 25,
            max_idle_connections: 10,
            max_lifetime: Duration::from_secs(5 * 60),
            max_idle_time: Duration::from_secs(5 * 60),
            health_check_interval: Duration::from_secs(30),
            health_check_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_interval: Duration::from_secs(1),
            slow_threshold: Duration::from_millis(200),
        }
    }
}

impl From<&Settings> for ManagerConfig {
    fn from(settings: &Settings) -> Self {
        let db = &settings.database;
        Self {
            database_url: db.url.clone(),
            replica_url: db.replica_url.clone().filter(|url| !url.trim().is_empty()),
            max_open_connections: db.max_open_connections,
            max_idle_connections: db.max_idle_connections,
            max_lifetime: Duration::from_secs(db.max_lifetime_secs),
            max_idle_time: Duration::from_secs(db.max_idle_time_secs),
            health_check_interval: Duration::from_secs(settings.health.interval_secs),
            health_check_timeout: Duration::from_secs(settings.health.timeout_secs),
            max_retries: settings.retry.max_retries,
            retry_interval: Duration::from_millis(settings.retry.interval_ms),
            slow_threshold: Duration::from_millis(db.slow_query_threshold_ms),
        }
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("database_url", &mask_url(&self.database_url))
            .field("replica_url", &self.replica_url.as_deref().map(mask_url))
            .field("max_open_connections", &self.max_open_connections)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("max_lifetime", &self.max_lifetime)
            .field("max_idle_time", &self.max_idle_time)
            .field("health_check_interval", &self.health_check_interval)
            .field("health_check_timeout", &self.health_check_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_interval", &self.retry_interval)
            .field("slow_threshold", &self.slow_threshold)
            .finish()
    }
}
