//! The worker's inbound queue (spec §3's "Operation").
//!
//! A submitted action's concrete success type is erased to `Box<dyn Any +
//! Send>` so the queue can carry one uniform `Operation` type regardless of
//! what callers submit; [`crate::held_transaction::HeldTransaction::submit`]
//! downcasts the boxed value back on the way out.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;
use txn_db::DbError;

use crate::state::TxState;

pub(crate) type ErasedAction = Box<
    dyn for<'a> FnOnce(
            &'a sea_orm::DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = Result<Box<dyn Any + Send>, DbError>> + Send + 'a>>
        + Send,
>;

/// A failed `execute`, carrying whether the whole held transaction is gone
/// (`true`) or only the per-operation savepoint rolled back (`false`).
pub(crate) struct OpFailure {
    pub(crate) error: DbError,
    pub(crate) transaction_rolled_back: bool,
}

pub(crate) type ErasedOutcome = Result<Box<dyn Any + Send>, OpFailure>;

/// One entry on a held transaction's operation queue.
pub(crate) enum Operation {
    /// Round-trips through the worker so `start` can block until the outer
    /// transaction is actually open.
    ReadyProbe { ack: oneshot::Sender<()> },
    /// Run `action` inside a fresh savepoint and report the outcome.
    Execute {
        action: ErasedAction,
        respond: oneshot::Sender<ErasedOutcome>,
    },
    /// Stop the worker loop and resolve the outer transaction to `target`.
    Terminate {
        target: TxState,
        ack: oneshot::Sender<()>,
    },
}
