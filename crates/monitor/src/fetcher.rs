//! Status fetch capability injected into the pollers

use async_trait::async_trait;
use runwatch_common::{FetchError, StatusSnapshot};
use std::sync::Arc;

/// Fetches the current status of one execution.
///
/// Any `Err` is treated as a transport failure for that job. The pollers
/// impose no timeout of their own; a fetcher that wants one applies it here.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, FetchError>;
}

#[async_trait]
impl<T: StatusFetcher + ?Sized> StatusFetcher for Arc<T> {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, FetchError> {
        (**self).fetch_status(job_id).await
    }
}
