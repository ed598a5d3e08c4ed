//! A single monitored rule and its lifecycle
//!
//! Every alert shares the same debounced state machine:
//!
//! ```text
//! inactive --trigger--> pending --trigger, held for `duration`--> active
//!     ^                    |                                        |
//!     +------clear---------+-----------------clear------------------+
//! ```
//!
//! With a zero `duration` a triggering tick moves straight to `active`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{self, MissedTickBehavior};

use super::config::AlertConfig;
use super::error::{ConfigurationError, FetchError};
use super::evaluator::{build_evaluator, Decision, Evaluator};
use crate::config::SourceConfig;

/// Lifecycle state of an alert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Inactive,
    Pending,
    Active,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Inactive => "inactive",
            AlertStatus::Pending => "pending",
            AlertStatus::Active => "active",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime state of an alert
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertState {
    pub status: AlertStatus,
    /// Start of the current episode
    pub last_alert: Option<DateTime<Utc>>,
    /// Last evaluation tick
    pub last_processed: Option<DateTime<Utc>>,
    /// Message recorded on activation
    pub alert_message: Option<String>,
}

/// A configured rule with its evaluator, state and schedule
pub struct Alert {
    config: AlertConfig,
    fingerprint: String,
    evaluator: Box<dyn Evaluator>,
    state: RwLock<AlertState>,
    /// Present while the evaluation task is scheduled; dropping it stops the task
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl fmt::Debug for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alert")
            .field("name", &self.config.name)
            .field("type", &self.config.kind)
            .field("fingerprint", &self.fingerprint)
            .field("state", &*self.state.read())
            .finish()
    }
}

impl Alert {
    /// Build an alert whose evaluator is chosen by `config.kind`
    pub fn from_config(sources: &SourceConfig, config: AlertConfig) -> Result<Self, ConfigurationError> {
        validate(&config)?;
        let evaluator = build_evaluator(sources, &config)?;
        Ok(Self::assemble(config, evaluator))
    }

    /// Build an alert around an existing evaluator
    pub fn with_evaluator(
        config: AlertConfig,
        evaluator: Box<dyn Evaluator>,
    ) -> Result<Self, ConfigurationError> {
        validate(&config)?;
        Ok(Self::assemble(config, evaluator))
    }

    fn assemble(config: AlertConfig, evaluator: Box<dyn Evaluator>) -> Self {
        let fingerprint = fingerprint(&config.name, &config.kind, &config.description);
        Self {
            config,
            fingerprint,
            evaluator,
            state: RwLock::new(AlertState::default()),
            shutdown_tx: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> &str {
        &self.config.kind
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Registry key derived from name, type and description
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn frequency(&self) -> Duration {
        self.config.frequency
    }

    pub fn duration(&self) -> Duration {
        self.config.duration
    }

    /// Handler names requested by this alert
    pub fn notification_handlers(&self) -> &[String] {
        &self.config.notification_handlers
    }

    pub fn status(&self) -> AlertStatus {
        self.state.read().status
    }

    pub fn is_active(&self) -> bool {
        self.status() == AlertStatus::Active
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_alert
    }

    /// Snapshot of the runtime state
    pub fn state(&self) -> AlertState {
        self.state.read().clone()
    }

    /// Activation message, else the configured default, else empty
    pub fn message(&self) -> String {
        if let Some(message) = &self.state.read().alert_message {
            return message.clone();
        }
        self.config.notification.message.clone().unwrap_or_default()
    }

    /// Record a triggering observation
    pub fn activate_alert(&self, message: Option<String>) {
        self.activate_at(message, Utc::now());
    }

    pub(crate) fn activate_at(&self, message: Option<String>, now: DateTime<Utc>) {
        let mut state = self.state.write();
        let started = *state.last_alert.get_or_insert(now);
        let elapsed = (now - started).to_std().unwrap_or_default();

        if elapsed >= self.config.duration {
            if state.status == AlertStatus::Active {
                if message.is_some() {
                    state.alert_message = message;
                }
                return;
            }

            tracing::info!(alert = %self.config.name, from = %state.status, "Alert rule 'active'");
            state.status = AlertStatus::Active;
            state.alert_message = message;
        } else if state.status == AlertStatus::Inactive {
            tracing::info!(alert = %self.config.name, "Alert rule 'pending'");
            state.status = AlertStatus::Pending;
        }
    }

    /// Record a clear observation; no-op while inactive
    pub fn deactivate_alert(&self) {
        let mut state = self.state.write();
        if state.status == AlertStatus::Inactive {
            return;
        }

        tracing::info!(alert = %self.config.name, from = %state.status, "Alert rule deactivated");
        state.status = AlertStatus::Inactive;
        state.last_alert = None;
        state.alert_message = None;
    }

    /// Run one evaluation cycle and apply its outcome
    pub async fn run(&self) {
        let outcome = self.evaluate().await;
        self.apply(outcome);
    }

    async fn evaluate(&self) -> Result<Decision, FetchError> {
        let start = Instant::now();
        tracing::debug!(alert = %self.config.name, "Evaluating rule");

        let outcome = self.evaluator.evaluate(&self.config).await;

        tracing::debug!(
            alert = %self.config.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluated rule"
        );
        outcome
    }

    fn apply(&self, outcome: Result<Decision, FetchError>) {
        self.state.write().last_processed = Some(Utc::now());

        match outcome {
            Ok(Decision::Activate(message)) => self.activate_alert(message),
            Ok(Decision::Deactivate) => self.deactivate_alert(),
            Ok(Decision::NoSignal) => {
                tracing::debug!(alert = %self.config.name, "No result to evaluate");
            }
            Err(e) => {
                tracing::warn!(
                    alert = %self.config.name,
                    source = self.evaluator.kind(),
                    error = %e,
                    "Alert evaluation failed"
                );
            }
        }
    }

    /// Evaluate after `offset`, then every `frequency` until [`stop`](Self::stop)
    ///
    /// Does nothing if the alert is already scheduled.
    pub fn schedule(self: &Arc<Self>, offset: Duration) {
        let mut slot = self.shutdown_tx.lock();
        if slot.is_some() {
            tracing::debug!(alert = %self.config.name, "Alert already scheduled");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *slot = Some(shutdown_tx);
        drop(slot);

        tracing::info!(
            alert = %self.config.name,
            offset_secs = offset.as_secs_f64(),
            frequency_secs = self.config.frequency.as_secs_f64(),
            "Scheduling rule"
        );

        let alert = Arc::clone(self);
        tokio::spawn(async move {
            let start = time::Instant::now() + offset;
            let mut ticker = time::interval_at(start, alert.config.frequency);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let outcome = alert.evaluate().await;
                        if shutdown_requested(&mut shutdown_rx) {
                            break;
                        }
                        alert.apply(outcome);
                    }
                }
            }

            tracing::info!(alert = %alert.config.name, "Rule evaluation stopped");
        });
    }

    /// Cancel future evaluations; safe to call at any time
    pub fn stop(&self) {
        if self.shutdown_tx.lock().take().is_some() {
            tracing::debug!(alert = %self.config.name, "Stopping rule");
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.shutdown_tx.lock().is_some()
    }
}

fn shutdown_requested(rx: &mut mpsc::Receiver<()>) -> bool {
    !matches!(rx.try_recv(), Err(TryRecvError::Empty))
}

fn validate(config: &AlertConfig) -> Result<(), ConfigurationError> {
    let required = [
        ("name", &config.name),
        ("type", &config.kind),
        ("description", &config.description),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigurationError::MissingField(field));
        }
    }

    if config.frequency.is_zero() {
        return Err(ConfigurationError::Invalid(format!(
            "frequency for '{}' must be greater than zero",
            config.name
        )));
    }
    Ok(())
}

/// Hex SHA-256 over the identity fields
pub fn fingerprint(name: &str, kind: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [name, kind, description] {
        hasher.update(field.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
