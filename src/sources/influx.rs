//! InfluxDB series query client (0.8 HTTP API)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{build_http_client, error_for_status, trim_base_url, TimeSeriesSource};
use crate::alerts::{ConfigurationError, FetchError};

const DEFAULT_PORT: u16 = 8086;

/// One series of a query response
#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub points: Vec<Vec<serde_json::Value>>,
}

/// Client bound to a single database
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http_client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    database: String,
}

impl InfluxClient {
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url_for_host(host),
            username: username.into(),
            password: password.into(),
            database: database.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TimeSeriesSource for InfluxClient {
    async fn query(&self, query: &str) -> Result<Option<f64>, FetchError> {
        let url = format!("{}/db/{}/series", self.base_url, self.database);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("u", self.username.as_str()),
                ("p", self.password.as_str()),
                ("q", query),
            ])
            .send()
            .await?;

        let series: Vec<Series> = error_for_status(response).await?.json().await?;
        first_value(&series)
    }
}

/// Value column of the first point of the first series
///
/// Points are `[time, value, ...]`.
pub fn first_value(series: &[Series]) -> Result<Option<f64>, FetchError> {
    let Some(point) = series.first().and_then(|s| s.points.first()) else {
        return Ok(None);
    };

    let value = point
        .get(1)
        .ok_or_else(|| FetchError::Decode("point has no value column".to_string()))?;

    value
        .as_f64()
        .map(Some)
        .ok_or_else(|| FetchError::Decode(format!("{} is not numeric", value)))
}

/// Accept `host`, `host:port` or a full URL
fn base_url_for_host(host: &str) -> String {
    if host.contains("://") {
        return trim_base_url(host);
    }

    let host = host.trim_end_matches('/');
    if host.contains(':') {
        format!("http://{}", host)
    } else {
        format!("http://{}:{}", host, DEFAULT_PORT)
    }
}
