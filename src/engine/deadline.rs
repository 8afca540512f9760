//! engine::deadline
//!
//! One deadline shared by every store call of a cycle.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::error::{Phase, PublishError};
use crate::store::StoreError;

/// Point in time by which a cycle must be done, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    /// No deadline.
    pub fn none() -> Self {
        Self(None)
    }

    /// Await a store call under the deadline, keeping the store result as is.
    pub async fn bound<T, F>(&self, phase: Phase, fut: F) -> Result<Result<T, StoreError>, PublishError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.0 {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| PublishError::Timeout { phase }),
            None => Ok(fut.await),
        }
    }

    /// Await a store call under the deadline, mapping store errors to `phase`.
    pub async fn run<T, F>(&self, phase: Phase, fut: F) -> Result<T, PublishError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.bound(phase, fut)
            .await?
            .map_err(|e| PublishError::from_store(phase, e))
    }
}
