//! A single held transaction: one worker, one pinned connection, one
//! in-memory operation queue (spec §4.1).

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use txn_db::{Db, DbError, OuterTx, SavepointOutcome};
use txn_errors::TransactionError;

use crate::clock::Clock;
use crate::operation::{ErasedOutcome, Operation, OpFailure};
use crate::state::TxState;

const QUEUE_CAPACITY: usize = 32;

/// The externally visible attribute bundle (spec §4.1's `as_view`, wire
/// shape per spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    pub id: String,
    pub state: &'static str,
    pub timeout_seconds: u32,
    pub expires_at: String,
    pub created_at: String,
}

/// A single held transaction.
///
/// Owns nothing directly except the handle side of its operation queue: the
/// pinned connection and the outer transaction live entirely inside the
/// worker task spawned by [`HeldTransaction::spawn`]. `HeldTransaction` is
/// cheap to share (`Arc`) across request tasks; the queue + state mutex make
/// that sharing safe.
pub struct HeldTransaction {
    id: String,
    state: Arc<Mutex<TxState>>,
    timeout_seconds: u32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    queue_tx: mpsc::Sender<Operation>,
}

impl std::fmt::Debug for HeldTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeldTransaction")
            .field("id", &self.id)
            .field("state", &self.state_snapshot().as_str())
            .finish_non_exhaustive()
    }
}

impl HeldTransaction {
    /// Acquire a connection, spawn the worker, and block until the outer
    /// transaction is open (spec §4.1's `start`, folded into construction so
    /// no caller can observe a `HeldTransaction` whose worker isn't ready).
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Internal`] if the worker cannot be
    /// reached during the initial ready-probe (e.g. it faulted immediately
    /// while beginning the outer transaction).
    pub async fn spawn(
        db: Db,
        timeout_seconds: u32,
        clock: &dyn Clock,
    ) -> Result<Arc<Self>, TransactionError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = clock.now_utc();
        let expires_at = created_at + chrono::Duration::seconds(i64::from(timeout_seconds));
        let state = Arc::new(Mutex::new(TxState::Open));
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);

        tokio::spawn(run_worker(db, queue_rx, Arc::clone(&state), id.clone()));

        let held = Arc::new(Self {
            id: id.clone(),
            state,
            timeout_seconds,
            created_at,
            expires_at,
            queue_tx,
        });

        held.ready_probe().await?;
        Ok(held)
    }

    async fn ready_probe(&self) -> Result<(), TransactionError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .queue_tx
            .send(Operation::ReadyProbe { ack: ack_tx })
            .await
            .is_err()
        {
            return Err(TransactionError::Internal(format!(
                "held transaction {} worker failed to start",
                self.id
            )));
        }
        ack_rx.await.map_err(|_| {
            TransactionError::Internal(format!(
                "held transaction {} worker failed to start",
                self.id
            ))
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn state_snapshot(&self) -> TxState {
        *self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state_snapshot().is_open()
    }

    #[must_use]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.is_open() && clock.now_utc() > self.expires_at
    }

    #[must_use]
    pub fn as_view(&self) -> TransactionView {
        TransactionView {
            id: self.id.clone(),
            state: self.state_snapshot().as_str(),
            timeout_seconds: self.timeout_seconds,
            expires_at: self.expires_at.to_rfc3339(),
            created_at: self.created_at.to_rfc3339(),
        }
    }

    /// Run `action` against the pinned connection inside a fresh savepoint
    /// (spec §4.1's `submit`).
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Expired`] if the transaction is no longer
    /// open, or [`TransactionError::OperationError`] if `action` itself
    /// fails (the savepoint rolls back, the outer transaction stays open).
    pub async fn submit<F, T>(&self, action: F) -> Result<T, TransactionError>
    where
        F: for<'a> FnOnce(
                &'a sea_orm::DatabaseTransaction,
            )
                -> Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'a>>
            + Send
            + 'static,
        T: Send + 'static,
    {
        if !self.is_open() {
            return Err(TransactionError::Expired(self.id.clone()));
        }

        let erased: crate::operation::ErasedAction = Box::new(move |tx| {
            Box::pin(async move {
                action(tx)
                    .await
                    .map(|value| Box::new(value) as Box<dyn Any + Send>)
            })
        });

        let (respond_tx, respond_rx) = oneshot::channel();
        if self
            .queue_tx
            .send(Operation::Execute {
                action: erased,
                respond: respond_tx,
            })
            .await
            .is_err()
        {
            // The worker already exited (fault or race with terminate); its
            // exit path has already updated `state`, so this is expiry, not
            // an internal error.
            return Err(TransactionError::Expired(self.id.clone()));
        }

        let outcome: ErasedOutcome = respond_rx.await.map_err(|_| {
            TransactionError::Internal(format!(
                "held transaction {} worker terminated unexpectedly",
                self.id
            ))
        })?;

        match outcome {
            Ok(boxed) => boxed.downcast::<T>().map(|b| *b).map_err(|_| {
                TransactionError::Internal(
                    "internal type mismatch decoding held transaction operation result"
                        .to_owned(),
                )
            }),
            Err(OpFailure {
                error,
                transaction_rolled_back,
            }) => Err(TransactionError::OperationError {
                id: self.id.clone(),
                detail: error.to_string(),
                transaction_rolled_back,
                validation: error.is_validation_class(),
            }),
        }
    }

    /// Transition to `committed`: the worker returns from the outer
    /// transaction block normally, which commits at the database.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Expired`] if the transaction is already
    /// terminal.
    pub async fn commit(&self) -> Result<(), TransactionError> {
        self.terminate(TxState::Committed).await
    }

    /// Symmetric with [`commit`](Self::commit): the worker rolls the outer
    /// transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::Expired`] if the transaction is already
    /// terminal.
    pub async fn rollback(&self) -> Result<(), TransactionError> {
        self.terminate(TxState::RolledBack).await
    }

    /// Claim the transition under the state mutex, rejecting a second
    /// concurrent caller (or a reaper racing a user-initiated call)
    /// immediately instead of letting both dispatch to the worker.
    ///
    /// This is the "Manager-authorised terminate call" the data model
    /// description allows to mutate state directly, alongside the worker
    /// itself (spec §3).
    fn claim_transition(&self, target: TxState) -> Result<(), TransactionError> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.is_open() {
            return Err(TransactionError::Expired(self.id.clone()));
        }
        *state = target;
        Ok(())
    }

    async fn terminate(&self, target: TxState) -> Result<(), TransactionError> {
        self.claim_transition(target)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .queue_tx
            .send(Operation::Terminate {
                target,
                ack: ack_tx,
            })
            .await
            .is_err()
        {
            // Worker already gone (fault); our claim above already recorded
            // the intended terminal state and the worker's own fault path
            // would have landed on rolled_back anyway.
            return Ok(());
        }

        ack_rx.await.map_err(|_| {
            TransactionError::Internal(format!(
                "held transaction {} worker terminated unexpectedly",
                self.id
            ))
        })
    }
}

/// The worker loop: owns the pinned connection and the outer transaction
/// for the entire lifetime of the held transaction (spec §4.1).
async fn run_worker(
    db: Db,
    mut queue: mpsc::Receiver<Operation>,
    state: Arc<Mutex<TxState>>,
    id: String,
) {
    let outer = match db.begin_outer().await {
        Ok(outer) => outer,
        Err(e) => {
            tracing::error!(id = %id, error = %e, "failed to begin outer transaction");
            *state.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = TxState::RolledBack;
            return;
        }
    };

    let terminal = drive_queue(&outer, &mut queue, &id).await;

    let resolve = match terminal {
        TxState::Committed => outer.commit().await,
        TxState::Open | TxState::RolledBack => outer.rollback().await,
    };
    if let Err(e) = resolve {
        tracing::error!(id = %id, error = %e, "failed to resolve outer transaction");
    }
    *state.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = terminal;
    tracing::debug!(id = %id, state = %terminal.as_str(), "held transaction worker exited");
}

/// Drain the queue until an explicit terminate or a fault. Returns the
/// state the outer transaction should resolve to.
async fn drive_queue(
    outer: &OuterTx,
    queue: &mut mpsc::Receiver<Operation>,
    id: &str,
) -> TxState {
    while let Some(op) = queue.recv().await {
        match op {
            Operation::ReadyProbe { ack } => {
                let _ = ack.send(());
            }
            Operation::Execute { action, respond } => {
                match outer.execute_with_savepoint(action).await {
                    Ok(value) => {
                        let _ = respond.send(Ok(value));
                    }
                    Err(SavepointOutcome::Action(error)) => {
                        let _ = respond.send(Err(OpFailure {
                            error,
                            transaction_rolled_back: false,
                        }));
                    }
                    Err(SavepointOutcome::Infra(error)) => {
                        tracing::error!(
                            id = %id,
                            error = %error,
                            "savepoint infrastructure failure; tearing down held transaction"
                        );
                        let _ = respond.send(Err(OpFailure {
                            error,
                            transaction_rolled_back: true,
                        }));
                        return TxState::RolledBack;
                    }
                }
            }
            Operation::Terminate { target, ack } => {
                let _ = ack.send(());
                return target;
            }
        }
    }

    // Every sender (the HeldTransaction handle) was dropped without an
    // explicit commit/rollback: invariant (v), fault path, rolled back.
    TxState::RolledBack
}
