//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;

use super::super::state::AppState;
use crate::transfer::ProcessorStatsSnapshot;

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Build revision
    pub version: &'static str,
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<ProcessorStatsSnapshot>,
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("GIT_HASH"),
        timestamp_ms: Utc::now().timestamp_millis(),
        processor: state.processor_stats.as_ref().map(|s| s.snapshot()),
    })
}
