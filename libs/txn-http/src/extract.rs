//! Extractor for the transaction correlation header (spec §6).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

const HEADER_NAME: &str = "X-Transaction-ID";

/// The value of the `X-Transaction-ID` header, if present.
///
/// Never rejects: an absent header is the default non-transactional path,
/// not an error, so this extracts as `Option<TransactionId>` rather than
/// failing the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionId(pub String);

impl<S> FromRequestParts<S> for TransactionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(HEADER_NAME)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned(),
        ))
    }
}

impl<S> FromRequestParts<S> for Option<TransactionId>
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| TransactionId(s.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    #[tokio::test]
    async fn extracts_present_header() {
        let request = Request::builder()
            .header(HEADER_NAME, HeaderValue::from_static("tx-123"))
            .body(())
            .expect("build request");
        let (mut parts, ()) = request.into_parts();

        let id = <Option<TransactionId> as FromRequestParts<()>>::from_request_parts(
            &mut parts,
            &(),
        )
        .await
        .expect("infallible");
        assert_eq!(id, Some(TransactionId("tx-123".to_owned())));
    }

    #[tokio::test]
    async fn missing_header_extracts_to_none() {
        let request = Request::builder().body(()).expect("build request");
        let (mut parts, ()) = request.into_parts();

        let id = <Option<TransactionId> as FromRequestParts<()>>::from_request_parts(
            &mut parts,
            &(),
        )
        .await
        .expect("infallible");
        assert_eq!(id, None);
    }
}
