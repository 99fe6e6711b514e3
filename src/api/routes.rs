//! Trigger endpoints
//!
//! Endpoints:
//!   POST /attest                -> Ad hoc attestation text (plain string)
//!   POST /events/report-updated -> Relay-delivered ReportUpdated log
//!   POST /cycle/run             -> One health-check cycle on demand (409 if one is running)
//!   GET  /health                -> Service health

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::alerts::BreachAlertDispatcher;
use crate::attestation::{AdhocReply, handle_adhoc};
use crate::context::Capabilities;
use crate::error::GuardError;
use crate::report::LedgerLog;
use crate::workflows::{CycleStatus, CycleSummary, handle_report_event, run_health_check};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub caps: Capabilities,
    /// Outlives individual events so redelivered reports stay deduplicated
    pub dispatcher: Arc<RwLock<BreachAlertDispatcher>>,
}

impl AppState {
    pub fn new(caps: Capabilities, dispatcher: Arc<RwLock<BreachAlertDispatcher>>) -> Self {
        Self { caps, dispatcher }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub stablecoins: Vec<String>,
    pub alerts_sent: u64,
}

/// Terminal errors map to 422 with the error text
impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/attest", post(attest))
        .route("/events/report-updated", post(report_updated))
        .route("/cycle/run", post(run_cycle))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn attest(State(state): State<AppState>, body: Bytes) -> Result<Response, GuardError> {
    let ctx = state.caps.invocation_now();
    match handle_adhoc(&ctx, &body).await? {
        AdhocReply::Text(text) => Ok((StatusCode::OK, text).into_response()),
        AdhocReply::Rejected(message) => Ok((StatusCode::BAD_REQUEST, message).into_response()),
    }
}

async fn report_updated(
    State(state): State<AppState>,
    Json(log): Json<LedgerLog>,
) -> Result<String, GuardError> {
    let ctx = state.caps.invocation_now();
    handle_report_event(&ctx, &state.dispatcher, &log)
        .await
        .inspect_err(|e| warn!("Report event failed: {}", e))
}

/// 409 while a scheduled or earlier requested cycle is still running
async fn run_cycle(State(state): State<AppState>) -> (StatusCode, Json<CycleSummary>) {
    info!("Health check cycle requested over HTTP");
    let ctx = state.caps.invocation_now();
    let summary = run_health_check(&ctx).await;
    let status = match summary.status {
        CycleStatus::Completed => StatusCode::OK,
        CycleStatus::AlreadyRunning => StatusCode::CONFLICT,
    };
    (status, Json(summary))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let alerts_sent = state.dispatcher.read().await.alerts_sent();
    Json(HealthResponse {
        status: "healthy",
        service: "stableguard-oracle",
        version: env!("CARGO_PKG_VERSION"),
        stablecoins: state
            .caps
            .settings
            .stablecoins
            .iter()
            .map(|coin| coin.symbol.to_string())
            .collect(),
        alerts_sent,
    })
}
