//! Bounded fan-out of independent async tasks.
//!
//! Stages spawn one task per unit of work (edge, chunk, batch) into a
//! `JoinSet`. Each task holds a permit of the shared semaphore while it talks
//! to an external service. A failing or panicking task is logged and dropped;
//! its siblings keep running.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, warn};

use crate::error::AppError;

/// Wait for a permit on the shared concurrency limit.
pub async fn acquire(limit: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit, AppError> {
    limit
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| AppError::Task("concurrency limit closed".into()))
}

/// Drain `set`, returning the successful results in completion order.
pub async fn collect<T: 'static>(mut set: JoinSet<Result<T, AppError>>, stage: &'static str) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(res) = set.join_next().await {
        match res {
            Err(e) => error!(stage, "task panicked: {e}"),
            Ok(Err(e)) => warn!(stage, error = %e, "task failed, skipping"),
            Ok(Ok(v)) => out.push(v),
        }
    }
    out
}
