//! The closed error taxonomy for the held-transaction core (see spec §7).

use http::StatusCode;

/// Errors that can occur while creating, looking up, driving, or tearing
/// down a held transaction.
///
/// This is the single error type threaded through the Manager, the
/// `HeldTransaction` worker, and the request dispatcher. It is closed by
/// design: every external failure mode the core contract promises (§7) has
/// exactly one variant, and nothing downstream should need to match on
/// string content to classify a failure.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum TransactionError {
    /// Lookup of an unknown transaction id.
    #[error("transaction {0} not found")]
    NotFound(String),

    /// The transaction is past its deadline, or its state is already
    /// terminal (committed or rolled back).
    #[error("transaction {0} has expired")]
    Expired(String),

    /// `max_concurrent` held transactions are already open.
    #[error("concurrency limit of {0} held transactions reached")]
    ConcurrencyLimit(u32),

    /// An action submitted to an open transaction failed.
    ///
    /// `transaction_rolled_back` is `false` when only the per-operation
    /// savepoint rolled back (the held transaction is still open and
    /// reusable); `true` when the whole held transaction is gone (e.g. the
    /// worker faulted and tore the transaction down).
    ///
    /// `validation` marks the cause as a validation-class database failure
    /// (constraint violation, bad input) for the 422-vs-500 split in §6; the
    /// caller of `submit` is responsible for classifying its own cause.
    ///
    /// `id` identifies the held transaction the failed operation was
    /// submitted to; `OperationError` always carries a `meta` block (§7).
    #[error("operation failed: {detail}")]
    OperationError {
        id: String,
        detail: String,
        transaction_rolled_back: bool,
        validation: bool,
    },

    /// An `update` request asked for a state other than `committed` or
    /// `rolled_back`.
    #[error("invalid state transition requested: {0}")]
    InvalidStateTransition(String),

    /// Any other internal fault not covered by the above (connection lost,
    /// programmer error, etc).
    #[error("internal transaction error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// The HTTP status code the contract (§6) assigns to this error kind.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Expired(_) => StatusCode::GONE,
            Self::ConcurrencyLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::OperationError { validation, .. } => {
                if *validation {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            Self::InvalidStateTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The transaction id to report in the error response's `meta` block,
    /// if this error kind carries one (§7: only `Expired` and
    /// `OperationError` do; `NotFound` is explicitly meta-less because the
    /// id in question does not name a known transaction).
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::Expired(id) | Self::OperationError { id, .. } => Some(id.as_str()),
            Self::NotFound(_)
            | Self::ConcurrencyLimit(_)
            | Self::InvalidStateTransition(_)
            | Self::Internal(_) => None,
        }
    }

    /// Whether the held transaction itself is gone as a result of this
    /// error (as opposed to only a savepoint having rolled back).
    #[must_use]
    pub fn transaction_rolled_back(&self) -> bool {
        match self {
            Self::Expired(_) => true,
            Self::OperationError {
                transaction_rolled_back,
                ..
            } => *transaction_rolled_back,
            Self::NotFound(_)
            | Self::ConcurrencyLimit(_)
            | Self::InvalidStateTransition(_)
            | Self::Internal(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404_without_meta() {
        let e = TransactionError::NotFound("abc".to_owned());
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(e.transaction_id(), None);
        assert!(!e.transaction_rolled_back());
    }

    #[test]
    fn expired_maps_to_410_and_carries_rolled_back_true() {
        let e = TransactionError::Expired("abc".to_owned());
        assert_eq!(e.status_code(), StatusCode::GONE);
        assert!(e.transaction_rolled_back());
    }

    #[test]
    fn concurrency_limit_maps_to_429() {
        let e = TransactionError::ConcurrencyLimit(10);
        assert_eq!(e.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(e.transaction_id(), None);
    }

    #[test]
    fn operation_error_splits_422_vs_500_on_validation_flag() {
        let validation = TransactionError::OperationError {
            id: "tx-1".to_owned(),
            detail: "unique constraint violated".to_owned(),
            transaction_rolled_back: false,
            validation: true,
        };
        assert_eq!(validation.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!validation.transaction_rolled_back());
        assert_eq!(validation.transaction_id(), Some("tx-1"));

        let infra = TransactionError::OperationError {
            id: "tx-1".to_owned(),
            detail: "connection reset".to_owned(),
            transaction_rolled_back: true,
            validation: false,
        };
        assert_eq!(infra.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(infra.transaction_rolled_back());
    }

    #[test]
    fn invalid_state_transition_maps_to_422() {
        let e = TransactionError::InvalidStateTransition("foo".to_owned());
        assert_eq!(e.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
