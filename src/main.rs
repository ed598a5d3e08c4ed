//! Tripwire Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - TRIPWIRE_ALERTS_PATH: YAML alert file or directory (default: config/alerts)
//! - TRIPWIRE_HOST: Status API bind address (default: 0.0.0.0)
//! - TRIPWIRE_PORT: Status API port (default: 8080)
//! - TRIPWIRE_CHECK_INTERVAL_SECS: Seconds between notification sweeps (default: 5)
//! - TRIPWIRE_NOTIFICATION_FREQUENCY_SECS: Seconds between repeat notifications (default: 300)
//! - TRIPWIRE_REQUEST_TIMEOUT_SECS: Data source request timeout (default: 30)
//! - RUST_LOG: Log level (default: info)
//!
//! Data sources:
//! - INFLUX_HOST, INFLUX_USERNAME, INFLUX_PASSWORD
//! - PAPERTRAIL_API_TOKEN, PAPERTRAIL_BASE_URL
//! - TASKCLUSTER_INDEX_URL, TASKCLUSTER_QUEUE_URL
//!
//! Notifications:
//! - WEBHOOK_URL: enables the `webhook` handler
//! - SNS_TOPIC_ARN: enables the `sns` handler (requires the `sns` feature)

use std::sync::Arc;

use tripwire::alerts::{load_alerts, AlertManager, LogHandler, NotificationHandler, WebhookHandler};
use tripwire::api::run_server;
use tripwire::config::ServiceConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripwire=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env();

    tracing::info!("Tripwire configuration:");
    tracing::info!("  Status API: {}:{}", config.host, config.port);
    tracing::info!("  Alerts path: {}", config.alerts_path.display());
    tracing::info!(
        "  Check interval: {} seconds",
        config.manager.check_interval.as_secs()
    );
    tracing::info!(
        "  Notification frequency: {} seconds",
        config.manager.notification_frequency.as_secs()
    );

    let mut handlers: Vec<Arc<dyn NotificationHandler>> = vec![Arc::new(LogHandler)];

    if let Some(ref url) = config.webhook_url {
        tracing::info!("  Webhook notifications: {}", url);
        handlers.push(Arc::new(WebhookHandler::new(url.clone(), config.sources.request_timeout)?));
    }

    #[cfg(feature = "sns")]
    {
        if let Some(ref topic_arn) = config.sns_topic_arn {
            tracing::info!("  SNS notifications: {}", topic_arn);
            handlers.push(Arc::new(tripwire::alerts::SnsHandler::from_env(topic_arn.clone()).await));
        }
    }

    #[cfg(not(feature = "sns"))]
    {
        if config.sns_topic_arn.is_some() {
            tracing::warn!("SNS_TOPIC_ARN is set but tripwire was built without the `sns` feature");
        }
    }

    // Without any default handler, alerts that name none would go unreported
    let mut manager_config = config.manager.clone();
    let has_default = handlers
        .iter()
        .any(|h| manager_config.default_handlers.iter().any(|d| d == h.name()));
    if !has_default {
        tracing::info!("  Default handlers unavailable, falling back to '{}'", LogHandler::NAME);
        manager_config.default_handlers = vec![LogHandler::NAME.to_string()];
    }

    let manager = handlers
        .into_iter()
        .fold(AlertManager::new(manager_config), |manager, handler| manager.with_handler(handler));

    tracing::info!("  Notification handlers: {}", manager.handler_names().join(", "));

    for alert in load_alerts(&config.alerts_path, &config.sources)? {
        tracing::info!(
            alert = %alert.name(),
            kind = %alert.kind(),
            fingerprint = %alert.fingerprint(),
            "Registering alert"
        );
        manager.register_alert(alert);
    }

    let manager = Arc::new(manager);
    manager.run();

    let shutdown_manager = Arc::clone(&manager);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received, stopping alerts...");
        shutdown_manager.stop();
    };

    run_server(&config.host, config.port, manager, shutdown).await
}
