use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::alerts::{AlertManager, AlertState, AlertSummary};

/// Application state shared across handlers
pub struct AppState {
    pub manager: Arc<AlertManager>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub running: bool,
    pub alerts: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        running: state.manager.is_running(),
        alerts: state.manager.len(),
    })
}

// ============================================================================
// Alerts
// ============================================================================

#[derive(Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertSummary>,
}

pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<AlertsResponse> {
    let mut alerts = state.manager.alerts();
    alerts.sort_by(|a, b| a.name.cmp(&b.name));
    Json(AlertsResponse { alerts })
}

#[derive(Serialize)]
pub struct AlertDetailResponse {
    pub fingerprint: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub frequency_secs: f64,
    pub duration_secs: f64,
    #[serde(flatten)]
    pub state: AlertState,
}

pub async fn alert_detail(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Result<Json<AlertDetailResponse>, ApiError> {
    let alert = state
        .manager
        .get(&fingerprint)
        .ok_or_else(|| ApiError::NotFound(format!("Alert '{}' not found", fingerprint)))?;

    Ok(Json(AlertDetailResponse {
        fingerprint: alert.fingerprint().to_string(),
        name: alert.name().to_string(),
        kind: alert.kind().to_string(),
        description: alert.description().to_string(),
        frequency_secs: alert.frequency().as_secs_f64(),
        duration_secs: alert.duration().as_secs_f64(),
        state: alert.state(),
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
