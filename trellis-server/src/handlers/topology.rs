use axum::{Json, extract::State};
use trellis_core::build_topology;
use trellis_model::TopologyGraph;

use crate::errors::AppResult;
use crate::infra::app_state::AppState;

/// Synthesize the graph from the current inventory snapshot. Always
/// recomputed; nothing to invalidate.
pub async fn get_topology(
    State(state): State<AppState>,
) -> AppResult<Json<TopologyGraph>> {
    let devices = state.inventory.list_devices().await?;
    let neighbors = state.inventory.list_neighbors().await?;
    Ok(Json(build_topology(&devices, &neighbors)))
}
