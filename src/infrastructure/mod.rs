//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Error categories and the manager error type
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL pool and connector

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
