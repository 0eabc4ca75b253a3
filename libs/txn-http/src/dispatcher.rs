//! Bridge between inbound requests and held transactions (spec §4.3).
//!
//! Absent a correlation header, `dispatch` runs the action on its own
//! one-off connection and transaction; present, it hands the action to the
//! matching [`HeldTransaction`](txn_core::HeldTransaction) instead.

use std::future::Future;
use std::pin::Pin;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sea_orm::DatabaseTransaction;
use txn_core::Manager;
use txn_db::{Db, DbError, SavepointOutcome};
use txn_errors::{ErrorObject, ErrorResponse, TransactionError};

use crate::extract::TransactionId;

type Action<T> = Box<
    dyn for<'a> FnOnce(
            &'a DatabaseTransaction,
        ) -> Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'a>>
        + Send,
>;

/// Failure from [`dispatch`]: either a held-transaction error (carries the
/// usual `meta` block) or a plain action failure on the untracked path,
/// which has no transaction to report in `meta`.
#[derive(Debug)]
pub enum DispatchError {
    Transaction(TransactionError),
    UntrackedAction { detail: String, validation: bool },
}

impl From<TransactionError> for DispatchError {
    fn from(err: TransactionError) -> Self {
        Self::Transaction(err)
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            Self::Transaction(err) => err.into_response(),
            Self::UntrackedAction { detail, validation } => {
                let status = if validation {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                let body = ErrorResponse {
                    errors: vec![ErrorObject {
                        status: status.as_u16().to_string(),
                        detail,
                    }],
                    meta: None,
                };
                let mut response = Json(body).into_response();
                *response.status_mut() = status;
                response
            }
        }
    }
}

/// Run `action` against the held transaction named by `txn_id`, or on an
/// ad hoc transaction of its own if `txn_id` is absent.
///
/// # Errors
///
/// Returns [`DispatchError::Transaction`] if `txn_id` names an unknown or
/// terminated held transaction, or the action itself fails inside a held
/// transaction; returns [`DispatchError::UntrackedAction`] if the action
/// fails on the untracked path.
pub async fn dispatch<T>(
    manager: &Manager,
    db: &Db,
    txn_id: Option<&TransactionId>,
    action: Action<T>,
) -> Result<T, DispatchError>
where
    T: Send + 'static,
{
    match txn_id {
        Some(id) => {
            let held = manager.find(&id.0).await?;
            held.submit(action).await.map_err(DispatchError::from)
        }
        None => run_untracked(db, action).await,
    }
}

async fn run_untracked<T: Send + 'static>(db: &Db, action: Action<T>) -> Result<T, DispatchError> {
    let outer = db.begin_outer().await.map_err(|e| {
        DispatchError::UntrackedAction {
            detail: e.to_string(),
            validation: false,
        }
    })?;

    match outer.execute_with_savepoint(action).await {
        Ok(value) => {
            outer.commit().await.map_err(|e| DispatchError::UntrackedAction {
                detail: e.to_string(),
                validation: false,
            })?;
            Ok(value)
        }
        Err(SavepointOutcome::Action(error)) => {
            if let Err(e) = outer.rollback().await {
                tracing::warn!(error = %e, "failed to roll back untracked action's transaction");
            }
            Err(DispatchError::UntrackedAction {
                validation: error.is_validation_class(),
                detail: error.to_string(),
            })
        }
        Err(SavepointOutcome::Infra(error)) => Err(DispatchError::UntrackedAction {
            detail: error.to_string(),
            validation: false,
        }),
    }
}
