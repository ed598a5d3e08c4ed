//! Notification handlers for alerts

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{ConfigurationError, NotifyError};
use crate::sources::build_http_client;

/// Payload delivered for a triggered rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub message: String,
    /// Episode start, unix millis
    pub time: i64,
}

/// A named destination for alert notifications
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Name alerts use to select this handler
    fn name(&self) -> &str;

    async fn notify(&self, subject: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the tracing log
#[derive(Debug, Default)]
pub struct LogHandler;

impl LogHandler {
    pub const NAME: &'static str = "log";
}

#[async_trait]
impl NotificationHandler for LogHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn notify(&self, subject: &str, notification: &Notification) -> Result<(), NotifyError> {
        tracing::warn!(
            alert = %notification.name,
            since = notification.time,
            "{}: {}",
            subject,
            notification.message
        );
        Ok(())
    }
}

/// POSTs notifications as JSON to a URL
pub struct WebhookHandler {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookHandler {
    pub const NAME: &'static str = "webhook";

    /// Requests that take longer than `timeout` fail with a transport error
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigurationError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            url: url.into(),
            headers: HashMap::new(),
        })
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl NotificationHandler for WebhookHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn notify(&self, subject: &str, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "subject": subject,
            "name": notification.name,
            "message": notification.message,
            "time": notification.time,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Transport(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }

        tracing::debug!(alert = %notification.name, url = %self.url, "Webhook notification sent");
        Ok(())
    }
}
