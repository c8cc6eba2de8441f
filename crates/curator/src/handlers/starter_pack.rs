//! Ranking API

use crate::cycle::SnapshotView;
use crate::AppState;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use starterpack_common::errors::{AppError, Result};
use starterpack_common::models::Snapshot;
use std::sync::Arc;

/// Response for the current starter pack
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarterPackResponse {
    pub success: bool,
    pub data: Arc<Snapshot>,
    pub last_updated: DateTime<Utc>,
}

/// Current ranking; 503 until the first cycle has completed
pub async fn get_starter_pack(State(state): State<AppState>) -> Result<Json<StarterPackResponse>> {
    match state.controller.view().await {
        SnapshotView::NotInitialized => Err(AppError::NotInitialized),
        SnapshotView::Initializing => Err(AppError::Initializing),
        SnapshotView::Ready(snapshot) => Ok(Json(StarterPackResponse {
            success: true,
            last_updated: snapshot.last_updated,
            data: snapshot,
        })),
    }
}
