use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{health, scan, snmp, topology, ws};
use crate::infra::app_state::AppState;

/// Create all v1 API routes.
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/scan", get(scan::scan_get).post(scan::scan_post))
        .route("/snmp/poll", post(snmp::snmp_poll))
        .route("/topology", get(topology::get_topology))
        .route("/ws/topology", get(ws::topology_ws))
        .route("/health", get(health::health))
}
