use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct SnmpPollRequest {
    /// Device management IP.
    pub host: String,
    /// SNMP v2c community; falls back to the configured default.
    pub community: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SnmpPollResponse {
    pub ok: bool,
    pub host: String,
    pub sys_name: Option<String>,
    pub interfaces_count: usize,
    pub neighbors_count: usize,
}

pub async fn snmp_poll(
    State(state): State<AppState>,
    Json(req): Json<SnmpPollRequest>,
) -> AppResult<Json<SnmpPollResponse>> {
    let community = req
        .community
        .unwrap_or_else(|| state.config.snmp.default_community.clone());
    let outcome = state.pipeline.poll_snmp(&req.host, &community).await?;
    Ok(Json(SnmpPollResponse {
        ok: true,
        host: outcome.host,
        sys_name: outcome.sys_name,
        interfaces_count: outcome.interfaces,
        neighbors_count: outcome.neighbors,
    }))
}
