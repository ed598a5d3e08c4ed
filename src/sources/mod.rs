//! Data source clients
//!
//! Each evaluator variant reads from one of these capabilities. The HTTP
//! clients below are thin; anything implementing the traits can stand in
//! for them.

pub mod influx;
pub mod papertrail;
pub mod taskcluster;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::alerts::FetchError;

pub use influx::InfluxClient;
pub use papertrail::PapertrailClient;
pub use taskcluster::{IndexedTask, TaskRun, TaskStatus, TaskclusterClient};

/// Time-series store returning a single numeric value per query
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Run `query`; `None` when the query matched nothing
    async fn query(&self, query: &str) -> Result<Option<f64>, FetchError>;
}

/// Log search returning the number of matching events
#[async_trait]
pub trait LogSearchSource: Send + Sync {
    async fn search(&self, query: &str, min_time: DateTime<Utc>) -> Result<usize, FetchError>;
}

/// Task index plus queue status lookup
#[async_trait]
pub trait TaskIndexSource: Send + Sync {
    async fn find_task(&self, namespace: &str) -> Result<IndexedTask, FetchError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, FetchError>;
}

/// Turn a non-success response into `FetchError::Status`
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        code: status.as_u16(),
        body,
    })
}

pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> Result<reqwest::Client, crate::alerts::ConfigurationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            crate::alerts::ConfigurationError::Invalid(format!("Failed to create HTTP client: {}", e))
        })
}

/// Strip trailing slashes so paths can be appended with `format!`
pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
