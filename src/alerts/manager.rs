//! Alert registry, notification sweep and throttling

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use super::alert::{Alert, AlertStatus};
use super::notifier::{Notification, NotificationHandler};

/// Manager settings
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Time between notification sweeps
    pub check_interval: Duration,
    /// Minimum time between reports for the same episode
    pub notification_frequency: Duration,
    /// Handlers used when an alert names none that exist
    pub default_handlers: Vec<String>,
    /// Upper bound of the random delay before an alert's first evaluation
    pub schedule_jitter: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            notification_frequency: Duration::from_secs(300),
            default_handlers: vec!["sns".to_string()],
            schedule_jitter: Duration::from_secs(120),
        }
    }
}

struct RegistryEntry {
    alert: Arc<Alert>,
    /// Last report sent for the current episode
    last_reported: Mutex<Option<DateTime<Utc>>>,
}

/// Point-in-time view of a registered alert
#[derive(Debug, Clone, Serialize)]
pub struct AlertSummary {
    pub fingerprint: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: AlertStatus,
    pub last_reported: Option<DateTime<Utc>>,
}

/// Owns the registered alerts and reports the active ones
pub struct AlertManager {
    config: ManagerConfig,
    /// Registered alerts keyed by fingerprint
    alerts: DashMap<String, Arc<RegistryEntry>>,
    handlers: HashMap<String, Arc<dyn NotificationHandler>>,
    running: AtomicBool,
    /// Sweep shutdown signal sender
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl AlertManager {
    /// Create a manager; a zero `check_interval` falls back to the default
    pub fn new(mut config: ManagerConfig) -> Self {
        if config.check_interval.is_zero() {
            let fallback = ManagerConfig::default().check_interval;
            tracing::warn!(
                fallback_secs = fallback.as_secs(),
                "Check interval must be greater than zero, using default"
            );
            config.check_interval = fallback;
        }

        Self {
            config,
            alerts: DashMap::new(),
            handlers: HashMap::new(),
            running: AtomicBool::new(false),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Add a notification handler, keyed by its name
    pub fn with_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.handlers.insert(handler.name().to_string(), handler);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Register an alert under its fingerprint
    ///
    /// An alert with the same fingerprint replaces the earlier one.
    pub fn register_alert(&self, alert: impl Into<Arc<Alert>>) {
        let alert = alert.into();
        let fingerprint = alert.fingerprint().to_string();
        let entry = Arc::new(RegistryEntry {
            alert: Arc::clone(&alert),
            last_reported: Mutex::new(None),
        });

        if let Some(previous) = self.alerts.insert(fingerprint.clone(), entry) {
            tracing::warn!(
                alert = %alert.name(),
                fingerprint = %fingerprint,
                "Alert replaces an earlier registration with the same fingerprint"
            );
            previous.alert.stop();
        }

        if self.is_running() {
            alert.schedule(self.jitter());
        }
    }

    /// Registered alert by fingerprint
    pub fn get(&self, fingerprint: &str) -> Option<Arc<Alert>> {
        self.alerts.get(fingerprint).map(|e| Arc::clone(&e.alert))
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Snapshot of every registered alert
    pub fn alerts(&self) -> Vec<AlertSummary> {
        self.entries()
            .into_iter()
            .map(|entry| AlertSummary {
                fingerprint: entry.alert.fingerprint().to_string(),
                name: entry.alert.name().to_string(),
                kind: entry.alert.kind().to_string(),
                status: entry.alert.status(),
                last_reported: *entry.last_reported.lock(),
            })
            .collect()
    }

    fn entries(&self) -> Vec<Arc<RegistryEntry>> {
        self.alerts.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Schedule every alert and start the notification sweep
    pub fn run(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Alert manager already running");
            return;
        }

        // Stagger first evaluations so alerts do not all hit their sources at once
        for entry in self.entries() {
            entry.alert.schedule(self.jitter());
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let manager = Arc::clone(self);
        let check_interval = self.config.check_interval;
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + check_interval, check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => manager.check_alerts().await,
                }
            }

            tracing::info!("Alert sweep stopped");
        });

        tracing::info!(
            alerts = self.alerts.len(),
            check_interval_secs = check_interval.as_secs_f64(),
            notification_frequency_secs = self.config.notification_frequency.as_secs_f64(),
            "Alert manager started"
        );
    }

    /// Stop every alert and the sweep; no-op unless running
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        for entry in self.entries() {
            entry.alert.stop();
        }
        self.shutdown_tx.lock().take();

        tracing::info!("Alert manager stopped");
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.schedule_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }

    /// Run one notification sweep over every alert
    pub async fn check_alerts(&self) {
        self.check_alerts_at(Utc::now()).await;
    }

    pub(crate) async fn check_alerts_at(&self, now: DateTime<Utc>) {
        let entries = self.entries();
        let reports = entries
            .iter()
            .filter(|entry| self.should_report(entry, now))
            .map(|entry| self.report(entry, now));

        futures::future::join_all(reports).await;
    }

    fn should_report(&self, entry: &RegistryEntry, now: DateTime<Utc>) -> bool {
        let mut last_reported = entry.last_reported.lock();
        if !entry.alert.is_active() {
            *last_reported = None;
            return false;
        }

        match *last_reported {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed > self.config.notification_frequency)
                .unwrap_or(false),
        }
    }

    async fn report(&self, entry: &RegistryEntry, now: DateTime<Utc>) {
        if self.handlers.is_empty() {
            tracing::warn!(alert = %entry.alert.name(), "No notification handlers configured");
            return;
        }

        self.send_notification(&entry.alert).await;
        *entry.last_reported.lock() = Some(now);
    }

    /// Handlers the alert asked for, else the configured defaults
    fn resolve_handlers(&self, alert: &Alert) -> Vec<Arc<dyn NotificationHandler>> {
        let requested: Vec<_> = alert
            .notification_handlers()
            .iter()
            .filter_map(|name| self.handlers.get(name).cloned())
            .collect();
        if !requested.is_empty() {
            return requested;
        }

        self.config
            .default_handlers
            .iter()
            .filter_map(|name| {
                let handler = self.handlers.get(name).cloned();
                if handler.is_none() {
                    tracing::warn!(handler = %name, "Default notification handler not configured");
                }
                handler
            })
            .collect()
    }

    async fn send_notification(&self, alert: &Alert) {
        let subject = format!("Rule '{}' triggered", alert.name());
        let message = match alert.message() {
            message if message.is_empty() => subject.clone(),
            message => message,
        };
        let time = alert.last_alert().unwrap_or_else(Utc::now).timestamp_millis();
        let notification = Notification {
            name: alert.name().to_string(),
            message,
            time,
        };

        let handlers = self.resolve_handlers(alert);
        let sends = handlers.iter().map(|handler| {
            let subject = &subject;
            let notification = &notification;
            async move {
                match handler.notify(subject, notification).await {
                    Ok(()) => {
                        tracing::info!(alert = %notification.name, handler = handler.name(), "Notification sent");
                    }
                    Err(e) => {
                        tracing::error!(
                            alert = %notification.name,
                            handler = handler.name(),
                            error = %e,
                            "Error sending notification"
                        );
                    }
                }
            }
        });

        futures::future::join_all(sends).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::config::AlertConfig;
    use crate::alerts::error::NotifyError;
    use crate::alerts::evaluator::ThresholdQueryEvaluator;
    use crate::alerts::mock::{ScheduleEvaluator, StaticSeries};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    type Received = Arc<Mutex<Vec<(String, Notification)>>>;

    struct RecordingHandler {
        name: String,
        fail: bool,
        received: Received,
    }

    impl RecordingHandler {
        fn new(name: &str) -> (Arc<Self>, Received) {
            let received = Received::default();
            let handler = Arc::new(Self {
                name: name.to_string(),
                fail: false,
                received: received.clone(),
            });
            (handler, received)
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail: true,
                received: Received::default(),
            })
        }
    }

    #[async_trait]
    impl NotificationHandler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn notify(&self, subject: &str, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("broken pipe".to_string()));
            }
            self.received.lock().push((subject.to_string(), notification.clone()));
            Ok(())
        }
    }

    fn mock_config() -> AlertConfig {
        AlertConfig::new("mock-alert", "mock", "mock alert").with_frequency(Duration::from_millis(20))
    }

    fn mock_alert(config: AlertConfig) -> Arc<Alert> {
        Arc::new(Alert::with_evaluator(config, Box::new(ScheduleEvaluator::new(vec![true]))).unwrap())
    }

    fn manager_config(notification_frequency: Duration) -> ManagerConfig {
        ManagerConfig {
            check_interval: Duration::from_millis(50),
            notification_frequency,
            schedule_jitter: Duration::ZERO,
            ..ManagerConfig::default()
        }
    }

    fn last_reported(manager: &AlertManager) -> Option<DateTime<Utc>> {
        manager.alerts()[0].last_reported
    }

    #[test]
    fn test_alerts_registered() {
        let manager = AlertManager::new(ManagerConfig::default());
        manager.register_alert(mock_alert(mock_config()));

        let alerts = manager.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].name, "mock-alert");
        assert_eq!(alerts[0].kind, "mock");
        assert_eq!(alerts[0].status, AlertStatus::Inactive);
        assert!(alerts[0].last_reported.is_none());
    }

    #[test]
    fn test_fingerprint_collision_keeps_last() {
        let manager = AlertManager::new(ManagerConfig::default());
        let first = mock_alert(mock_config());
        let second = mock_alert(mock_config().with_threshold(10.0));

        manager.register_alert(first.clone());
        manager.register_alert(second.clone());

        assert_eq!(manager.len(), 1);
        let registered = manager.get(second.fingerprint()).unwrap();
        assert!(Arc::ptr_eq(&registered, &second));
        assert!(!Arc::ptr_eq(&registered, &first));
    }

    #[tokio::test]
    async fn test_throttle_window() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager =
            AlertManager::new(manager_config(Duration::from_secs(2))).with_handler(sns);
        let alert = mock_alert(mock_config());
        manager.register_alert(alert.clone());
        alert.activate_alert(None);

        let t0 = Utc::now();
        manager.check_alerts_at(t0).await;
        assert_eq!(received.lock().len(), 1);
        assert_eq!(last_reported(&manager), Some(t0));

        manager.check_alerts_at(t0 + ChronoDuration::seconds(1)).await;
        manager.check_alerts_at(t0 + ChronoDuration::seconds(2)).await;
        assert_eq!(received.lock().len(), 1);

        let t1 = t0 + ChronoDuration::milliseconds(2500);
        manager.check_alerts_at(t1).await;
        assert_eq!(received.lock().len(), 2);
        assert_eq!(last_reported(&manager), Some(t1));
    }

    #[tokio::test]
    async fn test_inactive_resets_throttle() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager =
            AlertManager::new(manager_config(Duration::from_secs(300))).with_handler(sns);
        let alert = mock_alert(mock_config());
        manager.register_alert(alert.clone());

        let t0 = Utc::now();
        alert.activate_alert(None);
        manager.check_alerts_at(t0).await;
        assert_eq!(received.lock().len(), 1);

        alert.deactivate_alert();
        manager.check_alerts_at(t0 + ChronoDuration::seconds(1)).await;
        assert!(last_reported(&manager).is_none());

        // A new episode is reported immediately despite the 300s window
        alert.activate_alert(None);
        manager.check_alerts_at(t0 + ChronoDuration::seconds(2)).await;
        assert_eq!(received.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_pending_alert_not_reported() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager = AlertManager::new(manager_config(Duration::from_secs(2))).with_handler(sns);
        let alert = mock_alert(mock_config().with_duration(Duration::from_secs(60)));
        manager.register_alert(alert.clone());

        alert.activate_alert(None);
        assert_eq!(alert.status(), AlertStatus::Pending);
        manager.check_alerts().await;
        assert!(received.lock().is_empty());
    }

    #[tokio::test]
    async fn test_notification_payload() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager = AlertManager::new(manager_config(Duration::from_secs(2))).with_handler(sns);

        let plain = mock_alert(mock_config());
        let custom = mock_alert(
            AlertConfig::new("custom-alert", "mock", "custom alert").with_message("custom message"),
        );
        manager.register_alert(plain.clone());
        manager.register_alert(custom.clone());
        plain.activate_alert(None);
        custom.activate_alert(None);

        manager.check_alerts().await;

        let received = received.lock();
        assert_eq!(received.len(), 2);
        let (subject, notification) = received
            .iter()
            .find(|(_, n)| n.name == "mock-alert")
            .unwrap();
        assert_eq!(subject, "Rule 'mock-alert' triggered");
        assert_eq!(notification.message, "Rule 'mock-alert' triggered");
        assert_eq!(notification.time, plain.last_alert().unwrap().timestamp_millis());

        let (subject, notification) = received
            .iter()
            .find(|(_, n)| n.name == "custom-alert")
            .unwrap();
        assert_eq!(subject, "Rule 'custom-alert' triggered");
        assert_eq!(notification.message, "custom message");
    }

    #[tokio::test]
    async fn test_handler_resolution() {
        let (sns, sns_received) = RecordingHandler::new("sns");
        let (webhook, webhook_received) = RecordingHandler::new("webhook");
        let manager = AlertManager::new(manager_config(Duration::from_secs(2)))
            .with_handler(sns)
            .with_handler(webhook);
        assert_eq!(manager.handler_names(), vec!["sns", "webhook"]);

        let targeted = mock_alert(
            AlertConfig::new("targeted", "mock", "targeted alert").with_handler("webhook"),
        );
        let unknown = mock_alert(
            AlertConfig::new("unknown", "mock", "unknown handler").with_handler("pager"),
        );
        manager.register_alert(targeted.clone());
        manager.register_alert(unknown.clone());
        targeted.activate_alert(None);
        unknown.activate_alert(None);

        manager.check_alerts().await;

        let webhook_received = webhook_received.lock();
        assert_eq!(webhook_received.len(), 1);
        assert_eq!(webhook_received[0].1.name, "targeted");

        let sns_received = sns_received.lock();
        assert_eq!(sns_received.len(), 1);
        assert_eq!(sns_received[0].1.name, "unknown");
    }

    #[tokio::test]
    async fn test_handler_failure_is_isolated() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager = AlertManager::new(manager_config(Duration::from_secs(2)))
            .with_handler(RecordingHandler::failing("broken"))
            .with_handler(sns);

        let alert = mock_alert(mock_config().with_handler("broken").with_handler("sns"));
        manager.register_alert(alert.clone());
        alert.activate_alert(None);

        manager.check_alerts().await;
        assert_eq!(received.lock().len(), 1);
        assert!(last_reported(&manager).is_some());
    }

    #[tokio::test]
    async fn test_no_handlers_configured() {
        let manager = AlertManager::new(manager_config(Duration::from_secs(2)));
        let alert = mock_alert(mock_config());
        manager.register_alert(alert.clone());
        alert.activate_alert(None);

        manager.check_alerts().await;
        assert!(last_reported(&manager).is_none());
    }

    #[tokio::test]
    async fn test_threshold_alert_reports_default_subject() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager = AlertManager::new(manager_config(Duration::from_secs(2))).with_handler(sns);

        let config = AlertConfig::new("error-rate", "influx", "error rate")
            .with_threshold(1.0)
            .with_query("select count(*) from errors");
        let evaluator = ThresholdQueryEvaluator::new(Arc::new(StaticSeries(Some(2.0))), "q");
        let alert = Arc::new(Alert::with_evaluator(config, Box::new(evaluator)).unwrap());
        manager.register_alert(alert.clone());

        alert.run().await;
        assert_eq!(alert.status(), AlertStatus::Active);

        manager.check_alerts().await;
        let received = received.lock();
        assert_eq!(received[0].1.message, "Rule 'error-rate' triggered");
    }

    #[tokio::test]
    async fn test_send_notifications_after_elapsed_interval() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager = Arc::new(
            AlertManager::new(manager_config(Duration::from_millis(100))).with_handler(sns),
        );
        manager.register_alert(mock_alert(mock_config()));

        manager.run();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        manager.stop();

        let received = received.lock();
        assert!(received.len() >= 4, "only {} notifications", received.len());
        assert!(received.len() <= 10, "{} notifications", received.len());

        let (subject, notification) = received.last().unwrap();
        assert_eq!(subject, "Rule 'mock-alert' triggered");
        assert_eq!(notification.message, "Rule 'mock-alert' triggered");
    }

    #[tokio::test]
    async fn test_custom_message_notification() {
        let (sns, received) = RecordingHandler::new("sns");
        let manager = Arc::new(
            AlertManager::new(manager_config(Duration::from_millis(50))).with_handler(sns),
        );
        manager.register_alert(mock_alert(mock_config().with_message("custom message")));
        manager.run();

        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while received.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        manager.stop();

        assert!(waited.is_ok(), "no notification sent");
        let received = received.lock();
        assert_eq!(received[0].0, "Rule 'mock-alert' triggered");
        assert_eq!(received[0].1.message, "custom message");
    }

    #[tokio::test]
    async fn test_zero_check_interval_uses_default() {
        let config = ManagerConfig {
            check_interval: Duration::ZERO,
            ..manager_config(Duration::from_secs(2))
        };
        let manager = Arc::new(AlertManager::new(config));
        assert_eq!(manager.config().check_interval, ManagerConfig::default().check_interval);

        manager.run();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(manager.is_running());
        manager.stop();
    }

    #[tokio::test]
    async fn test_run_and_stop_lifecycle() {
        let manager = Arc::new(AlertManager::new(manager_config(Duration::from_secs(2))));
        let alert = mock_alert(mock_config());
        manager.register_alert(alert.clone());

        // Stopping before running does nothing
        manager.stop();
        assert!(!manager.is_running());

        manager.run();
        manager.run();
        assert!(manager.is_running());
        assert!(alert.is_scheduled());

        manager.stop();
        assert!(!manager.is_running());
        assert!(!alert.is_scheduled());
    }
}
