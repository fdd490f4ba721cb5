//! HTTP status fetcher

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use runwatch_common::{FetchError, StatusSnapshot};
use runwatch_monitor::StatusFetcher;

use crate::config::WatchConfig;

/// Fetches execution status with a single `GET` per call.
///
/// No retries and no authentication; a request timeout applies when the
/// config sets one.
pub struct HttpStatusFetcher {
    client: reqwest::Client,
    base_url: String,
    status_path: String,
}

impl HttpStatusFetcher {
    pub fn new(config: &WatchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            status_path: config.status_path.clone(),
        })
    }

    /// URL polled for `job_id`
    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}{}", self.base_url, self.status_path.replace("{id}", job_id))
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, FetchError> {
        let url = self.status_url(job_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(job_id.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;
        let mut snapshot: StatusSnapshot = serde_json::from_str(&body)?;
        if snapshot.id != job_id {
            snapshot.id = job_id.to_string();
        }
        Ok(snapshot)
    }
}
