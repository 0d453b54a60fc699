use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::database::Role;

/// Closed set of failure categories reported by a database driver.
///
/// Retry classification matches on these tags, never on error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Endpoint could not be reached or the connection dropped
    Connection,
    /// Acquire or round-trip exceeded its deadline
    Timeout,
    /// The pool has been closed
    Closed,
    /// Generic integrity constraint violation (check, not-null, exclusion)
    ConstraintViolation,
    UniqueViolation,
    ForeignKeyViolation,
    /// Malformed input (bad literal, unknown column)
    InvalidInput,
    DivisionByZero,
    /// Numeric or datetime value out of range
    OutOfRange,
    /// Write attempted inside a read-only transaction
    ReadOnly,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Connection => "connection",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Closed => "closed",
            ErrorCategory::ConstraintViolation => "constraint_violation",
            ErrorCategory::UniqueViolation => "unique_violation",
            ErrorCategory::ForeignKeyViolation => "foreign_key_violation",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::DivisionByZero => "division_by_zero",
            ErrorCategory::OutOfRange => "out_of_range",
            ErrorCategory::ReadOnly => "read_only",
            ErrorCategory::Other => "other",
        }
    }

    /// Whether repeating the operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorCategory::ConstraintViolation
                | ErrorCategory::UniqueViolation
                | ErrorCategory::ForeignKeyViolation
                | ErrorCategory::InvalidInput
                | ErrorCategory::DivisionByZero
                | ErrorCategory::OutOfRange
                | ErrorCategory::ReadOnly
                | ErrorCategory::Closed
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`Pool`](crate::database::Pool) implementation.
#[derive(Debug, Clone, Error)]
#[error("{category}: {message}")]
pub struct DriverError {
    pub category: ErrorCategory,
    pub message: String,
}

impl DriverError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message)
    }

    pub fn closed() -> Self {
        Self::new(ErrorCategory::Closed, "pool is closed")
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

/// Errors surfaced by the database manager.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to {role} database: {source}")]
    Connection {
        role: Role,
        #[source]
        source: DriverError,
    },

    #[error("primary database unhealthy: {0}")]
    UnhealthyPrimary(#[source] DriverError),

    #[error("read replica degraded: {0}")]
    ReplicaDegraded(#[source] DriverError),

    #[error("database operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },

    #[error("non-retryable database error: {source}")]
    NonRetryable {
        #[source]
        source: Box<DbError>,
    },

    #[error("database manager is closed")]
    Closed,

    #[error("database operation canceled")]
    Canceled,

    #[error("transaction aborted by panic: {0}")]
    TransactionPanicked(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl DbError {
    /// Whether the retry executor should attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Driver(e) => e.is_retryable(),
            DbError::Connection { .. } | DbError::UnhealthyPrimary(_) | DbError::ReplicaDegraded(_) => {
                true
            }
            DbError::RetryExhausted { .. }
            | DbError::NonRetryable { .. }
            | DbError::Closed
            | DbError::Canceled
            | DbError::TransactionPanicked(_) => false,
        }
    }

    /// Driver category at the root of this error, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            DbError::Driver(e)
            | DbError::Connection { source: e, .. }
            | DbError::UnhealthyPrimary(e)
            | DbError::ReplicaDegraded(e) => Some(e.category),
            DbError::RetryExhausted { source, .. } | DbError::NonRetryable { source } => {
                source.category()
            }
            _ => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DbError::Connection { .. } => "CONNECTION_ERROR",
            DbError::UnhealthyPrimary(_) => "UNHEALTHY_PRIMARY",
            DbError::ReplicaDegraded(_) => "REPLICA_DEGRADED",
            DbError::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            DbError::NonRetryable { .. } => "NON_RETRYABLE",
            DbError::Closed => "MANAGER_CLOSED",
            DbError::Canceled => "CANCELED",
            DbError::TransactionPanicked(_) => "TRANSACTION_PANICKED",
            DbError::Driver(_) => "DRIVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            DbError::Connection { .. }
            | DbError::UnhealthyPrimary(_)
            | DbError::Closed
            | DbError::RetryExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let log_message = self.to_string();
        let client_message = if is_production() {
            "Database temporarily unavailable".to_string()
        } else {
            log_message.clone()
        };

        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "Operations API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_categories() {
        for category in [
            ErrorCategory::ConstraintViolation,
            ErrorCategory::UniqueViolation,
            ErrorCategory::ForeignKeyViolation,
            ErrorCategory::InvalidInput,
            ErrorCategory::DivisionByZero,
            ErrorCategory::OutOfRange,
        ] {
            assert!(!category.is_retryable(), "{category} should not retry");
        }

        assert!(ErrorCategory::Connection.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_wrapped_category_is_preserved() {
        let err = DbError::RetryExhausted {
            attempts: 3,
            source: Box::new(DbError::Driver(DriverError::timeout("ping"))),
        };
        assert_eq!(err.category(), Some(ErrorCategory::Timeout));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DbError::Closed.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            DbError::UnhealthyPrimary(DriverError::connection("refused")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            DbError::TransactionPanicked("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
