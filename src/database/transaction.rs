//! Begin/commit/rollback scope around a unit of work.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::DbError;
use crate::metrics::TransactionMetrics;

use super::driver::Pool;

/// Whether a scope may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxScope {
    Write,
    ReadOnly,
}

impl TxScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxScope::Write => "write",
            TxScope::ReadOnly => "read_only",
        }
    }
}

/// Run `f` inside a transaction on `pool`.
///
/// Commits when `f` returns `Ok`. Rolls back when it returns `Err` or
/// panics; a panic surfaces as [`DbError::TransactionPanicked`].
pub async fn run_in_transaction<P, T, E, F>(pool: &P, scope: TxScope, f: F) -> Result<T, E>
where
    P: Pool,
    T: Send,
    E: From<DbError> + Send,
    F: for<'t> FnOnce(&'t mut P::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
{
    let begin = match scope {
        TxScope::Write => pool.begin().await,
        TxScope::ReadOnly => pool.begin_read_only().await,
    };
    let mut tx = begin.map_err(DbError::from)?;

    // `f` itself may panic before handing back a future
    let outcome = AssertUnwindSafe(async { f(&mut tx).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(value)) => match pool.commit(tx).await {
            Ok(()) => {
                TransactionMetrics::record(scope.as_str(), "committed");
                Ok(value)
            }
            Err(e) => {
                TransactionMetrics::record(scope.as_str(), "commit_failed");
                tracing::warn!(scope = scope.as_str(), error = %e, "Transaction commit failed");
                Err(DbError::from(e).into())
            }
        },
        Ok(Err(e)) => {
            rollback(pool, tx, scope).await;
            TransactionMetrics::record(scope.as_str(), "rolled_back");
            Err(e)
        }
        Err(panic) => {
            rollback(pool, tx, scope).await;
            TransactionMetrics::record(scope.as_str(), "panicked");
            let message = panic_message(panic.as_ref());
            tracing::error!(
                scope = scope.as_str(),
                panic = %message,
                "Transaction body panicked, rolled back"
            );
            Err(DbError::TransactionPanicked(message).into())
        }
    }
}

async fn rollback<P: Pool>(pool: &P, tx: P::Tx, scope: TxScope) {
    if let Err(e) = pool.rollback(tx).await {
        tracing::warn!(scope = scope.as_str(), error = %e, "Transaction rollback failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
