//! Transaction managers
//!
//! A [`TransactionManager`] begins a transaction and hands back a
//! [`TransactionContext`] bound to one connection. The service passes
//! `context.connection()` into every store call explicitly, so all of them
//! run inside the same transaction.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, Transaction};
use tracing::{debug, warn};

use super::error::MemberError;
use crate::db::Database;

#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Context: TransactionContext;

    /// Name for logging
    fn name(&self) -> &'static str;

    /// Acquire a connection and start a transaction on it
    async fn begin(&self) -> Result<Self::Context, MemberError>;
}

/// One open transaction
///
/// Dropping a context without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) discards every write made through it.
#[async_trait]
pub trait TransactionContext: Send {
    /// The connection every statement of this transaction must run on
    fn connection(&mut self) -> &mut AnyConnection;

    async fn commit(self) -> Result<(), MemberError>;

    async fn rollback(self) -> Result<(), MemberError>;
}

// ============================================================================
// Pool-managed transactions
// ============================================================================

/// Delegates begin/commit/rollback to the pool's own transaction type
#[derive(Clone, Debug)]
pub struct PoolTransactionManager {
    db: Database,
}

impl PoolTransactionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

pub struct PoolTransaction {
    tx: Transaction<'static, Any>,
}

#[async_trait]
impl TransactionManager for PoolTransactionManager {
    type Context = PoolTransaction;

    fn name(&self) -> &'static str {
        "pool"
    }

    async fn begin(&self) -> Result<PoolTransaction, MemberError> {
        let tx = self.db.pool().begin().await?;
        debug!("pool transaction started");
        Ok(PoolTransaction { tx })
    }
}

#[async_trait]
impl TransactionContext for PoolTransaction {
    fn connection(&mut self) -> &mut AnyConnection {
        &mut *self.tx
    }

    async fn commit(self) -> Result<(), MemberError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), MemberError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ============================================================================
// Manually managed transactions
// ============================================================================

/// Issues `BEGIN` / `COMMIT` / `ROLLBACK` itself on a pooled connection
#[derive(Clone, Debug)]
pub struct ManualTransactionManager {
    db: Database,
}

impl ManualTransactionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Guard over a pooled connection with auto-commit switched off
///
/// The connection goes back to the pool only after `COMMIT` or `ROLLBACK`
/// succeeded. While `open` is set it is closed on drop instead, so no other
/// caller can ever receive it with a transaction still open.
pub struct ManualTransaction {
    conn: PoolConnection<Any>,
    open: bool,
}

impl ManualTransaction {
    async fn finish(mut self, statement: &'static str) -> Result<(), MemberError> {
        sqlx::query(statement).execute(&mut *self.conn).await?;
        debug!(statement, "manual transaction finished");
        // auto-commit is back on; conn returns to the pool on drop
        self.open = false;
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for ManualTransactionManager {
    type Context = ManualTransaction;

    fn name(&self) -> &'static str {
        "manual"
    }

    async fn begin(&self) -> Result<ManualTransaction, MemberError> {
        let mut conn = self.db.acquire().await?;
        if let Err(e) = sqlx::query("BEGIN").execute(&mut *conn).await {
            conn.close_on_drop();
            return Err(e.into());
        }
        debug!("manual transaction started");
        Ok(ManualTransaction { conn, open: true })
    }
}

#[async_trait]
impl TransactionContext for ManualTransaction {
    fn connection(&mut self) -> &mut AnyConnection {
        &mut *self.conn
    }

    async fn commit(self) -> Result<(), MemberError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), MemberError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for ManualTransaction {
    fn drop(&mut self) {
        if self.open {
            warn!("manual transaction dropped while open; closing its connection");
            self.conn.close_on_drop();
        }
    }
}
