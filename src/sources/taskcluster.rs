//! Taskcluster index and queue lookups

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, error_for_status, trim_base_url, TaskIndexSource};
use crate::alerts::{ConfigurationError, FetchError};

/// Index entry for a namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTask {
    #[serde(default)]
    pub namespace: String,
    pub task_id: String,
    #[serde(default)]
    pub rank: Option<u64>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub runs: Vec<TaskRun>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    #[serde(default)]
    pub run_id: Option<u32>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub resolved: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// Resolution time of the most recent run
    pub fn last_resolved(&self) -> Result<DateTime<Utc>, FetchError> {
        let run = self
            .runs
            .last()
            .ok_or_else(|| FetchError::Decode("task has no runs".to_string()))?;

        run.resolved
            .ok_or_else(|| FetchError::Decode("latest run is not resolved".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: TaskStatus,
}

/// Client for the index and queue services
#[derive(Debug, Clone)]
pub struct TaskclusterClient {
    http_client: reqwest::Client,
    index_url: String,
    queue_url: String,
}

impl TaskclusterClient {
    pub fn new(index_url: &str, queue_url: &str, timeout: Duration) -> Result<Self, ConfigurationError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            index_url: trim_base_url(index_url),
            queue_url: trim_base_url(queue_url),
        })
    }
}

#[async_trait]
impl TaskIndexSource for TaskclusterClient {
    async fn find_task(&self, namespace: &str) -> Result<IndexedTask, FetchError> {
        let url = format!("{}/task/{}", self.index_url, namespace);
        let response = self.http_client.get(&url).send().await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, FetchError> {
        let url = format!("{}/task/{}/status", self.queue_url, task_id);
        let response = self.http_client.get(&url).send().await?;
        let result: StatusResponse = error_for_status(response).await?.json().await?;
        Ok(result.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_response() {
        let task: IndexedTask = serde_json::from_value(serde_json::json!({
            "namespace": "garbage.1234",
            "taskId": "1234",
            "rank": 1451333343154u64,
            "data": {},
            "expires": "2016-01-27T20:03:01.292Z"
        }))
        .unwrap();

        assert_eq!(task.task_id, "1234");
        assert_eq!(task.namespace, "garbage.1234");
    }

    #[test]
    fn test_last_resolved() {
        let status: StatusResponse = serde_json::from_value(serde_json::json!({
            "status": {
                "runs": [
                    {"runId": 0, "state": "failed", "resolved": "2016-01-01T00:00:00.000Z"},
                    {"runId": 1, "state": "completed", "resolved": "2016-01-02T00:00:00.000Z"}
                ]
            }
        }))
        .unwrap();

        let resolved = status.status.last_resolved().unwrap();
        assert_eq!(resolved.to_rfc3339(), "2016-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_last_resolved_unresolved_run() {
        let status = TaskStatus {
            runs: vec![TaskRun {
                run_id: Some(0),
                state: Some("running".to_string()),
                resolved: None,
            }],
        };
        assert!(matches!(status.last_resolved(), Err(FetchError::Decode(_))));
        assert!(TaskStatus::default().last_resolved().is_err());
    }
}
