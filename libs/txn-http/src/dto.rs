//! Wire DTOs for the four lifecycle endpoints (spec §6).

use serde::{Deserialize, Serialize};
use txn_core::TransactionView;

pub const RESOURCE_TYPE: &str = "transactions";

/// `{"data": {"type": "transactions", "id", "attributes": {...}}}`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDocument {
    pub data: TransactionResource,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    pub attributes: TransactionAttributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionAttributes {
    pub state: String,
    pub timeout_seconds: u32,
    pub expires_at: String,
    pub created_at: String,
}

impl From<TransactionView> for TransactionResource {
    fn from(view: TransactionView) -> Self {
        Self {
            resource_type: RESOURCE_TYPE.to_owned(),
            id: view.id,
            attributes: TransactionAttributes {
                state: view.state.to_owned(),
                timeout_seconds: view.timeout_seconds,
                expires_at: view.expires_at,
                created_at: view.created_at,
            },
        }
    }
}

impl From<TransactionView> for TransactionDocument {
    fn from(view: TransactionView) -> Self {
        Self {
            data: view.into(),
        }
    }
}

/// `{"data": [...]}`, the list response body.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionCollectionDocument {
    pub data: Vec<TransactionResource>,
}

impl FromIterator<TransactionView> for TransactionCollectionDocument {
    fn from_iter<I: IntoIterator<Item = TransactionView>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(TransactionResource::from).collect(),
        }
    }
}

/// Body of `POST transactions`. The `attributes` object, and
/// `timeout_seconds` within it, are both optional (spec §6).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionDocument {
    #[serde(default)]
    pub data: CreateTransactionData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionData {
    #[serde(default)]
    pub attributes: CreateTransactionAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTransactionAttributes {
    pub timeout_seconds: Option<u32>,
}

/// Body of `PATCH transactions/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTransactionDocument {
    pub data: UpdateTransactionData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTransactionData {
    pub id: String,
    pub attributes: UpdateTransactionAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTransactionAttributes {
    pub state: String,
}

pub const STATE_COMMITTED: &str = "committed";
pub const STATE_ROLLED_BACK: &str = "rolled_back";
