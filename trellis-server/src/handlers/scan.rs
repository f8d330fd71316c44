use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use trellis_model::ScanProfile;

use crate::errors::{AppError, AppResult};
use crate::infra::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    /// Comma or space separated CIDRs/IPs.
    pub targets: String,
    #[serde(default)]
    pub profile: ScanProfile,
    #[serde(default)]
    pub skip_ping: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub targets: Vec<String>,
    #[serde(default)]
    pub profile: ScanProfile,
    #[serde(default)]
    pub skip_ping: bool,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub ok: bool,
    pub count: usize,
    pub hosts: Vec<String>,
}

pub async fn scan_get(
    State(state): State<AppState>,
    Query(params): Query<ScanParams>,
) -> AppResult<Json<ScanResponse>> {
    let targets = normalize_targets(&params.targets);
    run_scan(&state, targets, params.profile, params.skip_ping).await
}

pub async fn scan_post(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> AppResult<Json<ScanResponse>> {
    run_scan(&state, req.targets, req.profile, req.skip_ping).await
}

async fn run_scan(
    state: &AppState,
    targets: Vec<String>,
    profile: ScanProfile,
    skip_ping: bool,
) -> AppResult<Json<ScanResponse>> {
    if targets.is_empty() {
        return Err(AppError::bad_request("no scan targets given"));
    }
    let hosts = state
        .pipeline
        .run_scan(&targets, profile, skip_ping)
        .await?;
    Ok(Json(ScanResponse {
        ok: true,
        count: hosts.len(),
        hosts,
    }))
}

fn normalize_targets(raw: &str) -> Vec<String> {
    raw.replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
