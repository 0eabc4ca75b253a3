//! Thin adapter from the four lifecycle HTTP operations to `Manager` calls
//! (spec §4.4).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, response::IntoResponse};
use txn_core::{Manager, TxState};
use txn_errors::TransactionError;

use crate::dto::{
    CreateTransactionDocument, STATE_COMMITTED, STATE_ROLLED_BACK, TransactionCollectionDocument,
    TransactionDocument, UpdateTransactionDocument,
};

/// `POST transactions`.
///
/// # Errors
///
/// Returns [`TransactionError::ConcurrencyLimit`] if the process is already
/// holding `max_concurrent` transactions.
pub async fn create(
    State(manager): State<Arc<Manager>>,
    Json(body): Json<CreateTransactionDocument>,
) -> Result<impl IntoResponse, TransactionError> {
    let held = manager
        .create(body.data.attributes.timeout_seconds)
        .await?;
    let document: TransactionDocument = held.as_view().into();
    Ok((StatusCode::CREATED, Json(document)))
}

/// `GET transactions/{id}`.
///
/// # Errors
///
/// Returns [`TransactionError::NotFound`] if `id` is unknown.
pub async fn show(
    State(manager): State<Arc<Manager>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, TransactionError> {
    let held = manager.find(&id).await?;
    let document: TransactionDocument = held.as_view().into();
    Ok((StatusCode::OK, Json(document)))
}

/// `GET transactions`.
pub async fn list(State(manager): State<Arc<Manager>>) -> impl IntoResponse {
    let document: TransactionCollectionDocument =
        manager.active_transactions().await.into_iter().collect();
    (StatusCode::OK, Json(document))
}

/// `PATCH transactions/{id}`: commit or roll back the named transaction.
///
/// # Errors
///
/// Returns [`TransactionError::NotFound`]/[`TransactionError::Expired`] per
/// the usual Manager semantics, or [`TransactionError::InvalidStateTransition`]
/// if `attributes.state` is anything other than `committed`/`rolled_back`.
pub async fn update(
    State(manager): State<Arc<Manager>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTransactionDocument>,
) -> Result<impl IntoResponse, TransactionError> {
    let terminal_state = match body.data.attributes.state.as_str() {
        STATE_COMMITTED => TxState::Committed,
        STATE_ROLLED_BACK => TxState::RolledBack,
        other => return Err(TransactionError::InvalidStateTransition(other.to_owned())),
    };

    // Snapshot the view before terminating: the registry entry is gone by
    // the time commit/rollback returns, so this is the last chance to read
    // the other attributes.
    let mut view = manager.find(&id).await?.as_view();

    match terminal_state {
        TxState::Committed => manager.commit(&id).await?,
        TxState::Open | TxState::RolledBack => manager.rollback(&id).await?,
    }
    view.state = terminal_state.as_str();

    Ok((StatusCode::OK, Json(TransactionDocument { data: view.into() })))
}
