//! Alert configuration types

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Default seconds between evaluations
const DEFAULT_FREQUENCY_SECS: u64 = 60;

/// Alert definition as read from a configuration block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Rule name, taken from the configuration key when loaded from YAML
    pub name: String,
    /// Evaluator variant (`influx`, `papertrailSearch`, `indexedTask`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description
    pub description: String,
    /// Activate when the observed value exceeds this bound
    pub threshold: Option<f64>,
    /// Activate when the observed value falls below this bound
    pub min_threshold: Option<f64>,
    /// Time between evaluations
    #[serde(with = "seconds")]
    pub frequency: Duration,
    /// How long a condition must persist before the alert becomes active
    #[serde(with = "seconds")]
    pub duration: Duration,
    /// Source query (influx, papertrailSearch)
    pub query: Option<String>,
    /// Influx database
    pub database: Option<String>,
    /// Taskcluster index namespace (indexedTask)
    pub namespace: Option<String>,
    pub notification: NotificationSettings,
    /// Handler names this alert notifies through; empty means the manager defaults
    #[serde(alias = "notificationHandlers")]
    pub notification_handlers: Vec<String>,
}

impl AlertConfig {
    /// Create a new alert configuration
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Upper bound, defaulting to 0
    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(0.0)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_min_threshold(mut self, min_threshold: f64) -> Self {
        self.min_threshold = Some(min_threshold);
        self
    }

    /// Set evaluation interval
    pub fn with_frequency(mut self, frequency: Duration) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set pending duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the default notification message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.notification.message = Some(message.into());
        self
    }

    /// Add a notification handler by name
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.notification_handlers.push(handler.into());
        self
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: String::new(),
            description: String::new(),
            threshold: None,
            min_threshold: None,
            frequency: Duration::from_secs(DEFAULT_FREQUENCY_SECS),
            duration: Duration::ZERO,
            query: None,
            database: None,
            namespace: None,
            notification: NotificationSettings::default(),
            notification_handlers: Vec::new(),
        }
    }
}

/// Notification block of an alert definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Message used when the evaluator does not supply one
    #[serde(default)]
    pub message: Option<String>,
}

/// Durations expressed as (possibly fractional) seconds
mod seconds {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(D::Error::custom(format!(
                "expected a non-negative number of seconds, got {}",
                secs
            )));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_config_builder() {
        let config = AlertConfig::new("queue-depth", "influx", "Queue depth too high")
            .with_threshold(100.0)
            .with_frequency(Duration::from_secs(30))
            .with_handler("webhook");

        assert_eq!(config.name, "queue-depth");
        assert_eq!(config.threshold(), 100.0);
        assert_eq!(config.frequency.as_secs(), 30);
        assert_eq!(config.duration, Duration::ZERO);
        assert_eq!(config.notification_handlers, vec!["webhook".to_string()]);
    }

    #[test]
    fn test_defaults_from_yaml() {
        let config: AlertConfig = serde_yaml::from_str(
            r#"
type: papertrailSearch
description: 5xx responses
query: "status=500"
"#,
        )
        .unwrap();

        assert_eq!(config.kind, "papertrailSearch");
        assert_eq!(config.frequency, Duration::from_secs(60));
        assert_eq!(config.duration, Duration::ZERO);
        assert_eq!(config.threshold(), 0.0);
        assert!(config.min_threshold.is_none());
        assert!(config.notification_handlers.is_empty());
    }

    #[test]
    fn test_fractional_seconds_and_aliases() {
        let config: AlertConfig = serde_yaml::from_str(
            r#"
type: influx
description: low throughput
min_threshold: 1
frequency: 0.5
duration: 300
notification:
  message: throughput dropped
notificationHandlers: [sns, webhook]
"#,
        )
        .unwrap();

        assert_eq!(config.frequency, Duration::from_millis(500));
        assert_eq!(config.duration, Duration::from_secs(300));
        assert_eq!(config.min_threshold, Some(1.0));
        assert_eq!(config.notification.message.as_deref(), Some("throughput dropped"));
        assert_eq!(config.notification_handlers.len(), 2);
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let result: Result<AlertConfig, _> = serde_yaml::from_str("frequency: -1");
        assert!(result.is_err());
    }
}
