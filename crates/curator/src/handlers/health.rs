//! Health check handlers

use crate::cycle::{CycleStatus, SnapshotView};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle: Option<CycleStatus>,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub session: CheckResult,
    pub snapshot: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<usize>,
}

impl CheckResult {
    fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            last_updated: None,
            accounts: None,
        }
    }
}

/// Liveness check: healthy whenever the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: starterpack_common::VERSION.to_string(),
    })
}

/// Readiness check: session established and a ranking published
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (session, snapshot) = match state.controller.view().await {
        SnapshotView::NotInitialized => (CheckResult::status("down"), CheckResult::status("missing")),
        SnapshotView::Initializing => (CheckResult::status("up"), CheckResult::status("initializing")),
        SnapshotView::Ready(snapshot) => (
            CheckResult::status("up"),
            CheckResult {
                status: "ready".to_string(),
                last_updated: Some(snapshot.last_updated),
                accounts: Some(snapshot.users.len()),
            },
        ),
    };

    let all_ready = snapshot.status == "ready";
    let code = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(ReadyResponse {
            status: if all_ready { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks { session, snapshot },
            last_cycle: state.controller.last_cycle().await,
        }),
    )
}
