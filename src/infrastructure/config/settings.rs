use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub health: HealthCheckConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Optional read replica; empty means none
    #[serde(default)]
    pub replica_url: Option<String>,
    #[serde(default = "default_max_open_connections")]
    pub max_open_connections: u32,
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: u32,
    #[serde(default = "default_connection_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_connection_lifetime")]
    pub max_idle_time_secs: u64,
    #[serde(default = "default_slow_query_threshold")]
    pub slow_query_threshold_ms: u64,
}

fn default_max_open_connections() -> u32 {
    25
}

fn default_max_idle_connections() -> u32 {
    10
}

fn default_connection_lifetime() -> u64 {
    300 // 5 minutes
}

fn default_slow_query_threshold() -> u64 {
    200
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::database::mask_url;

        f.debug_struct("DatabaseConfig")
            .field("url", &mask_url(&self.url))
            .field("replica_url", &self.replica_url.as_deref().map(mask_url))
            .field("max_open_connections", &self.max_open_connections)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("max_idle_time_secs", &self.max_idle_time_secs)
            .field("slow_query_threshold_ms", &self.slow_query_threshold_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    /// Seconds between background health checks
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    /// Seconds a single liveness probe may take
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
}

fn default_health_interval() -> u64 {
    30
}

fn default_health_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total invocations of a retried operation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff; the n-th retry waits n times this
    #[serde(default = "default_retry_interval")]
    pub interval_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "nutridb".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("database.max_open_connections", 25)?
            .set_default("database.max_idle_connections", 10)?
            .set_default("health.interval_secs", 30)?
            .set_default("retry.max_retries", 3)?
            .set_default("server.port", 8082)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // NUTRIDB__DATABASE__URL, NUTRIDB__RETRY__MAX_RETRIES, ...
            .add_source(
                Environment::with_prefix("NUTRIDB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            // Conventional names used by the deployment scripts
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("database.replica_url", env::var("READ_REPLICA_URL").ok())?;

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_health_interval(),
            timeout_secs: default_health_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            interval_ms: default_retry_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
