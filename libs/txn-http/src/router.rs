//! Wires the four lifecycle endpoints onto an [`axum::Router`] (spec §6).

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use txn_core::Manager;

use crate::handlers;

/// Build a router exposing `POST transactions`, `GET transactions/{id}`,
/// `GET transactions`, and `PATCH transactions/{id}` against `manager`.
///
/// The caller nests this under whatever prefix the host application mounts;
/// this crate has no opinion on routing beyond these four paths.
#[must_use]
pub fn router(manager: Arc<Manager>) -> Router {
    Router::new()
        .route("/transactions", post(handlers::create).get(handlers::list))
        .route("/transactions/{id}", get(handlers::show).patch(handlers::update))
        .with_state(manager)
}
