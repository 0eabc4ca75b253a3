//! Axum surface for the held-transaction core: the `X-Transaction-ID`
//! extractor, the request dispatcher, the lifecycle controller handlers, and
//! the `Router` that wires them together. Nothing here is reachable without
//! `txn-core`; this crate only supplements it with the HTTP binding the core
//! itself deliberately leaves unspecified.

mod dispatcher;
mod dto;
mod extract;
mod handlers;
mod router;

pub use dispatcher::{DispatchError, dispatch};
pub use dto::{
    CreateTransactionAttributes, CreateTransactionData, CreateTransactionDocument,
    TransactionAttributes, TransactionCollectionDocument, TransactionDocument, TransactionResource,
    UpdateTransactionAttributes, UpdateTransactionData, UpdateTransactionDocument,
};
pub use extract::TransactionId;
pub use router::router;
