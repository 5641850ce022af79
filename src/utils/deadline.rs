// src/utils/deadline.rs
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// The call was abandoned, its effect on the other side is unknown.
#[derive(Debug, Error)]
#[error("{what} timed out after {limit:?}")]
pub struct TimedOut {
    pub what: String,
    pub limit: Duration,
}

/// Runs an external call with an upper bound on how long it may block the loop.
pub async fn bounded<T, F>(limit: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TimedOut {
            what: what.to_string(),
            limit,
        }
        .into()),
    }
}

pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TimedOut>().is_some()
}
