//! PostgreSQL backend.
//!
//! Implements the pool and connector seams on top of sqlx and maps
//! SQLSTATE codes onto error categories.

pub mod pool;

pub use pool::{category_for_sqlstate, PgTransaction, PostgresConnector, PostgresPool};
