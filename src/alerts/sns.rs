//! AWS SNS notification handler (`sns` feature)

use async_trait::async_trait;

use super::error::NotifyError;
use super::notifier::{Notification, NotificationHandler};

/// SNS rejects longer subjects
const MAX_SUBJECT_CHARS: usize = 100;

/// Publishes notifications to an SNS topic
pub struct SnsHandler {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsHandler {
    pub const NAME: &'static str = "sns";

    pub fn new(client: aws_sdk_sns::Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    /// Build a client from the standard AWS environment and profile chain
    pub async fn from_env(topic_arn: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_sns::Client::new(&config), topic_arn)
    }
}

#[async_trait]
impl NotificationHandler for SnsHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn notify(&self, subject: &str, notification: &Notification) -> Result<(), NotifyError> {
        let message = serde_json::to_string(notification)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        let subject: String = subject.chars().take(MAX_SUBJECT_CHARS).collect();

        self.client
            .publish()
            .target_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(format!("Error publishing SNS message: {}", e)))?;

        tracing::debug!(alert = %notification.name, topic = %self.topic_arn, "SNS notification sent");
        Ok(())
    }
}
