//! Consistency coordinator.
//!
//! Every multi-step mutation runs inside one [`WriteTx`]. The transaction is
//! opened with `BEGIN IMMEDIATE`, so SQLite takes the write lock before the
//! first read and concurrent writers queue for up to
//! [`WRITE_LOCK_WAIT`](crate::db::pool::WRITE_LOCK_WAIT). Reads that
//! decide the outcome therefore see the state the writes will land on.
//!
//! A `WriteTx` dropped without [`Coordinator::commit`] rolls back, which is
//! how every `?` early return leaves storage untouched.

use crate::db::pool::DbPool;
use crate::error::AppError;
use sqlx::{Sqlite, Transaction};

/// An open write transaction.
pub type WriteTx = Transaction<'static, Sqlite>;

/// Opens and commits write transactions against the shared pool.
#[derive(Debug, Clone)]
pub struct Coordinator {
    pool: DbPool,
}

impl Coordinator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for single-statement reads.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Begin a write transaction holding the database write lock.
    pub async fn begin(&self) -> Result<WriteTx, AppError> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| AppError::database_with_op(e.to_string(), "begin"))
    }

    /// Commit `tx`, labelling a failure with `operation`.
    pub async fn commit(&self, tx: WriteTx, operation: &str) -> Result<(), AppError> {
        tx.commit().await.map_err(|e| {
            log::error!("Commit failed for {}: {}", operation, e);
            AppError::database_with_op(e.to_string(), operation)
        })
    }
}
