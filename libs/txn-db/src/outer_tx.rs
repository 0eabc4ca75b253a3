//! The outer transaction and per-operation savepoints nested inside it.

use std::future::Future;
use std::pin::Pin;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::{DbError, Result};

/// The outcome of [`OuterTx::execute_with_savepoint`] when the action
/// itself fails.
///
/// This is distinct from [`DbError`]: a failing action does not mean the
/// database facade malfunctioned, only that the caller's action returned an
/// error. The outer transaction is left open either way.
#[derive(Debug)]
pub enum SavepointOutcome<E> {
    /// Opening or releasing the savepoint itself failed (infrastructure).
    Infra(DbError),
    /// The action ran and returned `Err(e)`; the savepoint was rolled back,
    /// the outer transaction remains open.
    Action(E),
}

impl<E: std::fmt::Display> std::fmt::Display for SavepointOutcome<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Infra(e) => write!(f, "savepoint infrastructure error: {e}"),
            Self::Action(e) => write!(f, "{e}"),
        }
    }
}

/// A single held transaction's outer `BEGIN … COMMIT`/`ROLLBACK` span.
///
/// Owns the pinned connection for its entire lifetime (spec §3's
/// non-observable "pinned database connection"). Not `Clone`: only the
/// worker that created it may drive it, which is what makes "the pinned
/// connection is never touched from any thread other than its owning
/// worker" (§5) true by construction.
pub struct OuterTx {
    tx: DatabaseTransaction,
}

impl std::fmt::Debug for OuterTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OuterTx").finish_non_exhaustive()
    }
}

impl OuterTx {
    pub(crate) async fn begin(conn: &DatabaseConnection) -> Result<Self> {
        let tx = conn.begin().await?;
        Ok(Self { tx })
    }

    /// Run `action` inside a nested transaction (a savepoint on the
    /// underlying database). On success the savepoint is released and the
    /// outer transaction remains open and reusable; on failure it is rolled
    /// back to, again leaving the outer transaction untouched — this is
    /// spec §4.1's `execute(action)` step.
    ///
    /// # Errors
    ///
    /// Returns [`SavepointOutcome::Infra`] if opening or releasing the
    /// savepoint fails at the database level, or [`SavepointOutcome::Action`]
    /// with the action's own error if it returns `Err`.
    pub async fn execute_with_savepoint<F, T, E>(
        &self,
        action: F,
    ) -> std::result::Result<T, SavepointOutcome<E>>
    where
        F: for<'a> FnOnce(
            &'a DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send + 'a>>,
    {
        let savepoint = self
            .tx
            .begin()
            .await
            .map_err(|e| SavepointOutcome::Infra(DbError::Sea(e)))?;

        match action(&savepoint).await {
            Ok(value) => {
                savepoint
                    .commit()
                    .await
                    .map_err(|e| SavepointOutcome::Infra(DbError::Sea(e)))?;
                Ok(value)
            }
            Err(err) => {
                // Roll back to the savepoint; the outer transaction survives.
                let _ = savepoint.rollback().await;
                Err(SavepointOutcome::Action(err))
            }
        }
    }

    /// Commit the outer transaction. Consumes `self`: once committed there
    /// is nothing left to drive.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sea`] if the `COMMIT` fails.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Roll back the outer transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sea`] if the `ROLLBACK` fails.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    /// Borrow the underlying transaction handle so application actions can
    /// run ordinary queries against it directly (used by `execute` when no
    /// savepoint isolation is needed, e.g. by migrations). Most callers
    /// should go through [`execute_with_savepoint`](Self::execute_with_savepoint) instead.
    #[must_use]
    pub fn inner(&self) -> &DatabaseTransaction {
        &self.tx
    }
}
