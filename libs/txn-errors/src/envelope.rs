//! The wire error shape the contract demands (spec §6):
//!
//! ```json
//! {
//!   "errors": [{"status": "404", "detail": "transaction abc not found"}],
//!   "meta": {"transaction_id": "abc", "transaction_rolled_back": true}
//! }
//! ```
//!
//! `meta` is present only for errors associated with a known held
//! transaction.

use serde::Serialize;

use crate::kind::TransactionError;

/// A single error object in the `errors` array.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    /// The HTTP status code as a string, per the contract.
    pub status: String,
    /// A human-readable message.
    pub detail: String,
}

/// The `meta` block, present only when the error is associated with a known
/// held transaction.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMeta {
    pub transaction_id: String,
    pub transaction_rolled_back: bool,
}

/// Top-level error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ErrorMeta>,
}

impl ErrorResponse {
    /// Build the wire response for a single `TransactionError`, per §6/§7.
    #[must_use]
    pub fn from_error(err: &TransactionError) -> Self {
        let status = err.status_code();
        let object = ErrorObject {
            status: status.as_u16().to_string(),
            detail: err.to_string(),
        };
        let meta = err.transaction_id().map(|id| ErrorMeta {
            transaction_id: id.to_owned(),
            transaction_rolled_back: err.transaction_rolled_back(),
        });
        Self {
            errors: vec![object],
            meta,
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for crate::kind::TransactionError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse::from_error(&self);
        tracing::warn!(status = %status, error = %self, "transaction request failed");
        let mut resp = axum::Json(body).into_response();
        *resp.status_mut() = status;
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_has_no_meta() {
        let err = TransactionError::ConcurrencyLimit(1);
        let resp = ErrorResponse::from_error(&err);
        assert!(resp.meta.is_none());
        assert_eq!(resp.errors[0].status, "429");
    }

    #[test]
    fn known_transaction_error_carries_meta() {
        let err = TransactionError::Expired("tx-1".to_owned());
        let resp = ErrorResponse::from_error(&err);
        let meta = resp.meta.expect("expired errors carry meta");
        assert_eq!(meta.transaction_id, "tx-1");
        assert!(meta.transaction_rolled_back);
    }

    #[test]
    fn serialises_to_the_contract_shape() {
        let err = TransactionError::NotFound("tx-9".to_owned());
        let resp = ErrorResponse::from_error(&err);
        let json = serde_json::to_value(&resp).expect("serialises");
        assert_eq!(json["errors"][0]["status"], "404");
        assert!(json.get("meta").is_none());
    }
}
