use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::{build_http_client, error_for_status, trim_base_url, LogSearchSource};
use crate::alerts::{ConfigurationError, FetchError};

const TOKEN_HEADER: &str = "X-Papertrail-Token";

/// Papertrail event search client
#[derive(Debug, Clone)]
pub struct PapertrailClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

impl PapertrailClient {
    pub fn new(
        base_url: &str,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: trim_base_url(base_url),
            api_token: api_token.into(),
        })
    }
}

#[async_trait]
impl LogSearchSource for PapertrailClient {
    async fn search(&self, query: &str, min_time: DateTime<Utc>) -> Result<usize, FetchError> {
        let url = format!("{}/events/search.json", self.base_url);
        let min_time = min_time.timestamp().to_string();

        let response = self
            .http_client
            .get(&url)
            .header(TOKEN_HEADER, &self.api_token)
            .query(&[("q", query), ("min_time", min_time.as_str())])
            .send()
            .await?;

        let result: SearchResponse = error_for_status(response).await?.json().await?;
        Ok(result.events.len())
    }
}
