use std::{future::Future, time::Duration};

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::error::AppError;

pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::MalformedPayload(e.to_string()))
}

/// Runs a storage call with an upper bound. Running out of time counts as the store being down.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    timeout(limit, call)
        .await
        .map_err(|_| AppError::StorageUnavailable(format!("timed out after {limit:?}")))?
}
