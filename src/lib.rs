//! Tripwire: scheduled alert evaluation and notification
//!
//! Alerts are rules loaded from YAML that poll a data source on their own
//! schedule (an InfluxDB query, a Papertrail search, the age of a Taskcluster
//! indexed task). Alerts whose condition holds for their configured duration
//! become active, and the alert manager reports them to notification handlers
//! no more often than its notification frequency.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tripwire::alerts::{load_alerts, AlertManager, LogHandler, ManagerConfig};
//! use tripwire::config::SourceConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sources = SourceConfig::from_env();
//! let manager = AlertManager::new(ManagerConfig::default())
//!     .with_handler(Arc::new(LogHandler));
//!
//! for alert in load_alerts("config/alerts".as_ref(), &sources)? {
//!     manager.register_alert(alert);
//! }
//!
//! let manager = Arc::new(manager);
//! manager.run();
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod config;
pub mod sources;

#[cfg(test)]
mod test_util;

// Re-export commonly used types
pub use alerts::{Alert, AlertConfig, AlertManager, AlertStatus, ManagerConfig};
pub use config::{ServiceConfig, SourceConfig};
