//! Source-specific evaluation strategies
//!
//! An evaluator fetches from its data source and reduces the result to a
//! [`Decision`]. The state machine that consumes decisions lives on
//! [`Alert`](super::Alert) and is shared by every variant.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::config::AlertConfig;
use super::error::{ConfigurationError, FetchError};
use crate::config::SourceConfig;
use crate::sources::{
    InfluxClient, LogSearchSource, PapertrailClient, TaskIndexSource, TaskclusterClient,
    TimeSeriesSource,
};

/// Outcome of a single evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Condition holds; optional message describing why
    Activate(Option<String>),
    /// Condition does not hold
    Deactivate,
    /// Nothing to act on this tick
    NoSignal,
}

/// Fetch-and-decide capability plugged into an alert
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Alert type this evaluator serves
    fn kind(&self) -> &'static str;

    async fn evaluate(&self, rule: &AlertConfig) -> Result<Decision, FetchError>;
}

/// Build the evaluator named by `config.kind`
pub fn build_evaluator(
    sources: &SourceConfig,
    config: &AlertConfig,
) -> Result<Box<dyn Evaluator>, ConfigurationError> {
    match config.kind.as_str() {
        ThresholdQueryEvaluator::KIND => {
            Ok(Box::new(ThresholdQueryEvaluator::from_config(sources, config)?))
        }
        LogSearchEvaluator::KIND => Ok(Box::new(LogSearchEvaluator::from_config(sources, config)?)),
        TaskAgeEvaluator::KIND => Ok(Box::new(TaskAgeEvaluator::from_config(sources, config)?)),
        other => Err(ConfigurationError::UnsupportedType(other.to_string())),
    }
}

fn required<'a>(value: Option<&'a String>, setting: &'static str) -> Result<&'a str, ConfigurationError> {
    value
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigurationError::MissingSetting(setting))
}

/// Compare a value against the alert's bounds
///
/// With `min_threshold` set the alert fires below it; otherwise it fires
/// above `threshold`.
pub fn threshold_decision(rule: &AlertConfig, value: f64) -> Decision {
    let (should_activate, bound, mode) = match rule.min_threshold {
        Some(min) => (value < min, min, "minimum threshold"),
        None => (value > rule.threshold(), rule.threshold(), "threshold"),
    };

    if should_activate {
        tracing::info!(
            alert = %rule.name,
            value,
            "{} {} crossed",
            mode,
            bound
        );
        Decision::Activate(None)
    } else {
        Decision::Deactivate
    }
}

// ============================================================================
// Time-series threshold
// ============================================================================

/// Single-value time-series query compared against a threshold
pub struct ThresholdQueryEvaluator {
    source: Arc<dyn TimeSeriesSource>,
    query: String,
}

impl ThresholdQueryEvaluator {
    pub const KIND: &'static str = "influx";

    pub fn new(source: Arc<dyn TimeSeriesSource>, query: impl Into<String>) -> Self {
        Self {
            source,
            query: query.into(),
        }
    }

    pub fn from_config(sources: &SourceConfig, config: &AlertConfig) -> Result<Self, ConfigurationError> {
        let influx = &sources.influx;
        let host = required(influx.host.as_ref(), "Influx host")?;
        let username = required(influx.username.as_ref(), "Influx username")?;
        let password = required(influx.password.as_ref(), "Influx password")?;
        let database = required(config.database.as_ref(), "Influx database")?;
        let query = required(config.query.as_ref(), "Influx query")?;

        let client = InfluxClient::new(host, username, password, database, sources.request_timeout)?;
        Ok(Self::new(Arc::new(client), query))
    }
}

#[async_trait]
impl Evaluator for ThresholdQueryEvaluator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn evaluate(&self, rule: &AlertConfig) -> Result<Decision, FetchError> {
        let value = match self.source.query(&self.query).await? {
            Some(value) => value,
            // No points in the window only means something for minimum bounds
            None if rule.min_threshold.is_some() => 0.0,
            None => return Ok(Decision::NoSignal),
        };

        Ok(threshold_decision(rule, value))
    }
}

// ============================================================================
// Log search count
// ============================================================================

/// Number of log events matching a search over the last `frequency`
pub struct LogSearchEvaluator {
    source: Arc<dyn LogSearchSource>,
    query: String,
}

impl LogSearchEvaluator {
    pub const KIND: &'static str = "papertrailSearch";

    pub fn new(source: Arc<dyn LogSearchSource>, query: impl Into<String>) -> Self {
        Self {
            source,
            query: query.into(),
        }
    }

    pub fn from_config(sources: &SourceConfig, config: &AlertConfig) -> Result<Self, ConfigurationError> {
        let papertrail = &sources.papertrail;
        let api_token = required(papertrail.api_token.as_ref(), "Papertrail API token")?;
        let base_url = required(papertrail.base_url.as_ref(), "Papertrail host")?;
        let query = required(config.query.as_ref(), "Papertrail search query")?;

        let client = PapertrailClient::new(base_url, api_token, sources.request_timeout)?;
        Ok(Self::new(Arc::new(client), query))
    }
}

#[async_trait]
impl Evaluator for LogSearchEvaluator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn evaluate(&self, rule: &AlertConfig) -> Result<Decision, FetchError> {
        let window = chrono::Duration::from_std(rule.frequency)
            .map_err(|e| FetchError::Decode(format!("search window out of range: {}", e)))?;
        let min_time = Utc::now() - window;

        // Event counts only have an upper bound; `min_threshold` does not apply
        let count = self.source.search(&self.query, min_time).await?;
        if count as f64 > rule.threshold() {
            tracing::info!(alert = %rule.name, count, "threshold {} crossed", rule.threshold());
            Ok(Decision::Activate(None))
        } else {
            Ok(Decision::Deactivate)
        }
    }
}

// ============================================================================
// Indexed task age
// ============================================================================

/// Age in hours of the latest run of an indexed task
pub struct TaskAgeEvaluator {
    source: Arc<dyn TaskIndexSource>,
    namespace: String,
}

impl TaskAgeEvaluator {
    pub const KIND: &'static str = "indexedTask";

    pub fn new(source: Arc<dyn TaskIndexSource>, namespace: impl Into<String>) -> Self {
        Self {
            source,
            namespace: namespace.into(),
        }
    }

    pub fn from_config(sources: &SourceConfig, config: &AlertConfig) -> Result<Self, ConfigurationError> {
        let namespace = required(config.namespace.as_ref(), "Indexed namespace")?;
        if config.threshold.is_none() {
            return Err(ConfigurationError::MissingSetting("Task age threshold (in hours)"));
        }

        let taskcluster = &sources.taskcluster;
        let client = TaskclusterClient::new(
            &taskcluster.index_url,
            &taskcluster.queue_url,
            sources.request_timeout,
        )?;
        Ok(Self::new(Arc::new(client), namespace))
    }

    /// Task id and age in hours of its latest resolved run
    async fn latest_run_age(&self, now: DateTime<Utc>) -> Result<(String, f64), FetchError> {
        let task = self.source.find_task(&self.namespace).await?;
        let status = self.source.task_status(&task.task_id).await?;
        let resolved = status.last_resolved()?;

        Ok((task.task_id, hours_between(resolved, now)))
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0 / 3600.0
}

#[async_trait]
impl Evaluator for TaskAgeEvaluator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn evaluate(&self, rule: &AlertConfig) -> Result<Decision, FetchError> {
        let (task_id, age) = match self.latest_run_age(Utc::now()).await {
            Ok(found) => found,
            // A missing task is exactly what this alert watches for
            Err(e) if e.is_not_found() => {
                return Ok(Decision::Activate(Some(format!(
                    "Error looking up '{}' namespace for rule '{}'",
                    self.namespace, rule.name
                ))));
            }
            Err(e) => return Err(e),
        };

        let threshold = rule.threshold();
        if age > threshold {
            Ok(Decision::Activate(Some(format!(
                "'{}' triggered.  Task '{}' age exceeds threshold. {:.2} hours > {} hours",
                rule.name, task_id, age, threshold
            ))))
        } else {
            Ok(Decision::Deactivate)
        }
    }
}
