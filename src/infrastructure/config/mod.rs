mod settings;

pub use settings::{
    DatabaseConfig, HealthCheckConfig, LoggingConfig, OtelConfig, RetryConfig, ServerConfig,
    Settings,
};
