use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{alert_detail, health_check, list_alerts, AppState};
use crate::alerts::AlertManager;

/// Build the status router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/alerts", get(list_alerts))
        .route("/alerts/:fingerprint", get(alert_detail))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the status API until `shutdown` resolves
pub async fn run_server(
    host: &str,
    port: u16,
    manager: Arc<AlertManager>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(Arc::new(AppState { manager }));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting status server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Status server stopped");
    Ok(())
}
