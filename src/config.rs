//! Service configuration
//!
//! Everything here is read from environment variables at startup:
//!
//! - TRIPWIRE_ALERTS_PATH: Directory of alert definition files (default: config/alerts)
//! - TRIPWIRE_HOST / TRIPWIRE_PORT: Status API bind address (default: 0.0.0.0:8080)
//! - TRIPWIRE_CHECK_INTERVAL_SECS: Notification sweep interval (default: 5)
//! - TRIPWIRE_NOTIFICATION_FREQUENCY_SECS: Minimum seconds between reports (default: 300)
//! - TRIPWIRE_REQUEST_TIMEOUT_SECS: Data source request timeout (default: 30)
//! - INFLUX_HOST, INFLUX_USERNAME, INFLUX_PASSWORD
//! - PAPERTRAIL_API_TOKEN, PAPERTRAIL_BASE_URL
//! - TASKCLUSTER_INDEX_URL, TASKCLUSTER_QUEUE_URL
//! - SNS_TOPIC_ARN: Enables the `sns` handler (requires the `sns` feature)
//! - WEBHOOK_URL: Enables the `webhook` handler

use std::path::PathBuf;
use std::time::Duration;

use crate::alerts::ManagerConfig;

pub const DEFAULT_INDEX_URL: &str = "https://index.taskcluster.net/v1";
pub const DEFAULT_QUEUE_URL: &str = "https://queue.taskcluster.net/v1";

/// Credentials and endpoints shared by every alert of a source kind
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub influx: InfluxSettings,
    pub papertrail: PapertrailSettings,
    pub taskcluster: TaskclusterSettings,
    /// Timeout applied to every data source request
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct InfluxSettings {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PapertrailSettings {
    pub api_token: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskclusterSettings {
    pub index_url: String,
    pub queue_url: String,
}

impl Default for TaskclusterSettings {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            queue_url: DEFAULT_QUEUE_URL.to_string(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            influx: InfluxSettings::default(),
            papertrail: PapertrailSettings::default(),
            taskcluster: TaskclusterSettings::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SourceConfig {
    pub fn from_env() -> Self {
        let taskcluster = TaskclusterSettings {
            index_url: env_string("TASKCLUSTER_INDEX_URL")
                .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            queue_url: env_string("TASKCLUSTER_QUEUE_URL")
                .unwrap_or_else(|| DEFAULT_QUEUE_URL.to_string()),
        };

        Self {
            influx: InfluxSettings {
                host: env_string("INFLUX_HOST"),
                username: env_string("INFLUX_USERNAME"),
                password: env_string("INFLUX_PASSWORD"),
            },
            papertrail: PapertrailSettings {
                api_token: env_string("PAPERTRAIL_API_TOKEN"),
                base_url: env_string("PAPERTRAIL_BASE_URL"),
            },
            taskcluster,
            request_timeout: Duration::from_secs(env_u64("TRIPWIRE_REQUEST_TIMEOUT_SECS", 30)),
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub alerts_path: PathBuf,
    pub sources: SourceConfig,
    pub manager: ManagerConfig,
    pub sns_topic_arn: Option<String>,
    pub webhook_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            alerts_path: PathBuf::from("config/alerts"),
            sources: SourceConfig::default(),
            manager: ManagerConfig::default(),
            sns_topic_arn: None,
            webhook_url: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let defaults = ManagerConfig::default();
        let manager = ManagerConfig {
            check_interval: Duration::from_secs(
                env_u64("TRIPWIRE_CHECK_INTERVAL_SECS", defaults.check_interval.as_secs()).max(1),
            ),
            notification_frequency: Duration::from_secs(env_u64(
                "TRIPWIRE_NOTIFICATION_FREQUENCY_SECS",
                defaults.notification_frequency.as_secs(),
            )),
            ..defaults
        };

        Self {
            host: env_string("TRIPWIRE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: std::env::var("TRIPWIRE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            alerts_path: env_string("TRIPWIRE_ALERTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/alerts")),
            sources: SourceConfig::from_env(),
            manager,
            sns_topic_arn: env_string("SNS_TOPIC_ARN"),
            webhook_url: env_string("WEBHOOK_URL"),
        }
    }
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
