//! The process-wide registry of held transactions (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use txn_db::Db;
use txn_errors::TransactionError;

use crate::clock::Clock;
use crate::config::Config;
use crate::held_transaction::{HeldTransaction, TransactionView};
use crate::reaper;

/// Registry state guarded by a single mutex: the mapping itself and the
/// reaper's join handle. One mutex for both, per spec §3's Manager
/// attributes and §5's "single mutex, brief critical sections" discipline.
struct Registry {
    transactions: HashMap<String, Arc<HeldTransaction>>,
    reaper: Option<ReaperHandle>,
}

struct ReaperHandle {
    join: JoinHandle<()>,
    shutdown: CancellationToken,
}

/// Singleton registry for held transactions.
///
/// Not literally a global: the application entry point owns one `Manager`
/// (typically behind an `Arc`) and hands it to every collaborator that needs
/// to create, find, or terminate held transactions (spec §9's "dynamic
/// global singleton" redesign note — singleton-ness is how it's wired, not
/// a property of the type).
pub struct Manager {
    db: Db,
    config: Config,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("max_concurrent", &self.config.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl Manager {
    #[must_use]
    pub fn new(db: Db, config: Config, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            db,
            config,
            clock,
            registry: Mutex::new(Registry {
                transactions: HashMap::new(),
                reaper: None,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Open a new held transaction, clamping `timeout_seconds` per spec §3.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::ConcurrencyLimit`] if `max_concurrent`
    /// held transactions are already open, or [`TransactionError::Internal`]
    /// if the worker cannot start (e.g. the pool is exhausted).
    pub async fn create(
        &self,
        timeout_seconds: Option<u32>,
    ) -> Result<Arc<HeldTransaction>, TransactionError> {
        {
            let registry = self.registry.lock().await;
            let open_count = registry.transactions.values().filter(|t| t.is_open()).count() as u32;
            if open_count >= self.config.max_concurrent {
                return Err(TransactionError::ConcurrencyLimit(self.config.max_concurrent));
            }
        }

        let clamped = self.config.clamp_timeout(timeout_seconds);
        let held = HeldTransaction::spawn(self.db.clone(), clamped, self.clock.as_ref()).await?;

        let mut registry = self.registry.lock().await;
        registry
            .transactions
            .insert(held.id().to_owned(), Arc::clone(&held));
        Ok(held)
    }

    /// Look up a held transaction by id.
    ///
    /// A faulted worker updates its own `state` but holds no registry handle
    /// to remove its entry; `find` reconciles that here by evicting any
    /// entry that is no longer open before reporting it as not found, so a
    /// dropped connection cannot keep a stale entry observable (spec §3
    /// Manager invariant (i), §7 "the entry becomes unreachable on the next
    /// find").
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] if no such transaction exists,
    /// or if it exists but is no longer open.
    pub async fn find(&self, id: &str) -> Result<Arc<HeldTransaction>, TransactionError> {
        let mut registry = self.registry.lock().await;
        match registry.transactions.get(id) {
            Some(held) if held.is_open() => Ok(Arc::clone(held)),
            Some(_) => {
                registry.transactions.remove(id);
                Err(TransactionError::NotFound(id.to_owned()))
            }
            None => Err(TransactionError::NotFound(id.to_owned())),
        }
    }

    /// Commit the named transaction and remove it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] if unknown, or
    /// [`TransactionError::Expired`] if it is no longer open.
    pub async fn commit(&self, id: &str) -> Result<(), TransactionError> {
        self.terminate(id, Terminate::Commit).await
    }

    /// Roll the named transaction back and remove it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::NotFound`] if unknown, or
    /// [`TransactionError::Expired`] if it is no longer open.
    pub async fn rollback(&self, id: &str) -> Result<(), TransactionError> {
        self.terminate(id, Terminate::Rollback).await
    }

    async fn terminate(&self, id: &str, which: Terminate) -> Result<(), TransactionError> {
        let held = self.find(id).await?;
        if !held.is_open() {
            // Remove it anyway if it's somehow still present (reaper/user race).
            self.registry.lock().await.transactions.remove(id);
            return Err(TransactionError::Expired(id.to_owned()));
        }

        let result = match which {
            Terminate::Commit => held.commit().await,
            Terminate::Rollback => held.rollback().await,
        };
        self.registry.lock().await.transactions.remove(id);
        result
    }

    /// Snapshot of all currently open transactions' attribute bundles.
    pub async fn active_transactions(&self) -> Vec<TransactionView> {
        let registry = self.registry.lock().await;
        registry
            .transactions
            .values()
            .filter(|t| t.is_open())
            .map(|t| t.as_view())
            .collect()
    }

    /// Number of currently open transactions.
    pub async fn active_count(&self) -> usize {
        let registry = self.registry.lock().await;
        registry.transactions.values().filter(|t| t.is_open()).count()
    }

    /// Start the background reaper sweep on its own schedule.
    ///
    /// Idempotent: calling this twice first stops the previous reaper
    /// cleanly (rather than leaving two sweeps running).
    pub async fn start_reaper(self: &Arc<Self>) {
        self.stop_reaper().await;
        let shutdown = CancellationToken::new();
        let join = tokio::spawn(reaper::run(Arc::clone(self), shutdown.clone()));
        self.registry.lock().await.reaper = Some(ReaperHandle { join, shutdown });
    }

    /// Stop the background reaper, if running, and wait for its current
    /// sweep (if any) to finish.
    pub async fn stop_reaper(&self) {
        let reaper = self.registry.lock().await.reaper.take();
        if let Some(reaper) = reaper {
            reaper.shutdown.cancel();
            if let Err(e) = reaper.join.await {
                tracing::warn!(error = %e, "reaper task panicked");
            }
        }
    }

    /// One reaper sweep: roll back every expired, still-open transaction.
    ///
    /// Errors during an individual rollback are logged; the entry is removed
    /// regardless, so a stuck connection cannot block the sweep (spec
    /// §4.2's "Reaper" contract).
    pub(crate) async fn reap_expired(&self) {
        let expired_ids: Vec<String> = {
            let registry = self.registry.lock().await;
            registry
                .transactions
                .values()
                .filter(|t| t.is_expired(self.clock.as_ref()))
                .map(|t| t.id().to_owned())
                .collect()
        };

        for id in expired_ids {
            match self.rollback(&id).await {
                Ok(()) => tracing::info!(id = %id, "reaper rolled back expired held transaction"),
                Err(TransactionError::NotFound(_) | TransactionError::Expired(_)) => {
                    // Lost the race with a user-initiated commit/rollback; fine.
                }
                Err(e) => tracing::warn!(id = %id, error = %e, "reaper failed to roll back expired transaction"),
            }
        }
    }

    /// Roll back every open transaction and stop the reaper. Used for
    /// graceful shutdown.
    pub async fn shutdown(&self) {
        self.stop_reaper().await;
        let ids: Vec<String> = {
            let registry = self.registry.lock().await;
            registry.transactions.keys().cloned().collect()
        };
        for id in ids {
            if let Err(e) = self.rollback(&id).await {
                tracing::warn!(id = %id, error = %e, "failed to roll back held transaction during shutdown");
            }
        }
    }

    /// Clear the registry without touching any worker (test-only: use when
    /// the transactions have already been torn down some other way).
    #[cfg(test)]
    pub(crate) async fn reset(&self) {
        self.registry.lock().await.transactions.clear();
    }
}

enum Terminate {
    Commit,
    Rollback,
}
