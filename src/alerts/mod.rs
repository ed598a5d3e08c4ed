//! Alert lifecycle engine
//!
//! Each [`Alert`] evaluates its rule on its own timer and moves through
//! inactive, pending and active states. The [`AlertManager`] sweeps the
//! registered alerts and reports the active ones to notification handlers,
//! throttled per episode.

pub mod alert;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod manager;
pub mod notifier;
#[cfg(feature = "sns")]
pub mod sns;

#[cfg(test)]
pub(crate) mod mock;

pub use alert::{fingerprint, Alert, AlertState, AlertStatus};
pub use config::{AlertConfig, NotificationSettings};
pub use error::{ConfigurationError, FetchError, NotifyError};
pub use evaluator::{
    build_evaluator, Decision, Evaluator, LogSearchEvaluator, TaskAgeEvaluator,
    ThresholdQueryEvaluator,
};
pub use loader::{load_alert_file, load_alerts, read_alert_configs, LoadError};
pub use manager::{AlertManager, AlertSummary, ManagerConfig};
pub use notifier::{LogHandler, Notification, NotificationHandler, WebhookHandler};
#[cfg(feature = "sns")]
pub use sns::SnsHandler;
